//! Operation task model: what to do, to which paths, and what happened.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::trash::TrashRecord;

/// Unique identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of mutation a task performs on every one of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
    Rename,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::Rename => "rename",
        };
        f.write_str(label)
    }
}

/// What to do when a destination already exists.
///
/// Chosen by the caller for every task; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the existing destination alone and record a skip.
    Skip,
    /// Replace the existing destination.
    Overwrite,
    /// Pick a free name such as `report (1).txt`.
    Rename,
}

/// One source path and, for copy/move/rename, its full destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationItem {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
}

impl OperationItem {
    pub fn new(source: PathBuf, destination: Option<PathBuf>) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Why an item was deliberately left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The destination exists and the policy is [`ConflictPolicy::Skip`].
    AlreadyExists,
    /// Source and destination are the same path.
    SameFile,
}

/// Result of executing one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The item was copied, moved, renamed or permanently deleted.
    /// `destination` is where it ended up (`None` for a permanent delete).
    Done { destination: Option<PathBuf> },
    /// The item was moved into the trash.
    Trashed(TrashRecord),
    Skipped { reason: SkipReason },
    /// No trash is available; the item is untouched until the task is
    /// resubmitted with permanent delete.
    RequiresConfirmation,
    Failed { error: String },
    /// The task was cancelled before or while this item ran; nothing of it
    /// was left behind.
    Cancelled,
}

impl ItemOutcome {
    /// `true` for outcomes that make a task `PartiallyFailed`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::RequiresConfirmation)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Trashed(_))
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, possibly waiting for a conflicting task to finish.
    Pending,
    Running,
    /// Finished; at least one item failed or needs confirmation.
    PartiallyFailed,
    /// Finished; every item succeeded or was deliberately skipped.
    Completed,
    Cancelled,
    /// Setup failed; no item was executed.
    Failed { reason: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Outcome recorded for one item, in item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// A batch of same-kind mutations plus its execution state.
///
/// Construct with [`OperationTask::copy`], [`OperationTask::move_to`],
/// [`OperationTask::delete`] or [`OperationTask::rename`], then hand it to
/// the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTask {
    id: TaskId,
    kind: OperationKind,
    items: Vec<OperationItem>,
    conflict_policy: ConflictPolicy,
    permanent_delete: bool,
    status: TaskStatus,
    outcomes: Vec<ItemResult>,
}

impl OperationTask {
    pub fn new(
        kind: OperationKind,
        items: Vec<OperationItem>,
        conflict_policy: ConflictPolicy,
    ) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            items,
            conflict_policy,
            permanent_delete: false,
            status: TaskStatus::Pending,
            outcomes: Vec::new(),
        }
    }

    /// Copies each source into `dest_dir`, keeping its file name.
    pub fn copy(sources: Vec<PathBuf>, dest_dir: &Path, policy: ConflictPolicy) -> Self {
        Self::new(OperationKind::Copy, into_dir(sources, dest_dir), policy)
    }

    /// Moves each source into `dest_dir`, keeping its file name.
    pub fn move_to(sources: Vec<PathBuf>, dest_dir: &Path, policy: ConflictPolicy) -> Self {
        Self::new(OperationKind::Move, into_dir(sources, dest_dir), policy)
    }

    /// Trashes each source. With `permanent` the sources are removed from
    /// storage instead.
    pub fn delete(sources: Vec<PathBuf>, permanent: bool) -> Self {
        let items = sources
            .into_iter()
            .map(|source| OperationItem::new(source, None))
            .collect();
        Self::new(OperationKind::Delete, items, ConflictPolicy::Skip)
            .with_permanent_delete(permanent)
    }

    /// Renames `source` to `new_name` within its own directory.
    pub fn rename(source: PathBuf, new_name: &str, policy: ConflictPolicy) -> Self {
        let destination = source
            .parent()
            .map(|parent| parent.join(new_name))
            .unwrap_or_else(|| PathBuf::from(new_name));
        Self::new(
            OperationKind::Rename,
            vec![OperationItem::new(source, Some(destination))],
            policy,
        )
    }

    pub fn with_permanent_delete(self, permanent_delete: bool) -> Self {
        Self {
            permanent_delete,
            ..self
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn items(&self) -> &[OperationItem] {
        &self.items
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    pub fn permanent_delete(&self) -> bool {
        self.permanent_delete
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn outcomes(&self) -> &[ItemResult] {
        &self.outcomes
    }

    /// Outcome recorded for `source`, if it has run.
    pub fn outcome(&self, source: &Path) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }

    pub fn report(&self) -> TaskReport {
        TaskReport::from(self)
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn record(&mut self, source: PathBuf, outcome: ItemOutcome) {
        self.outcomes.push(ItemResult { source, outcome });
    }

    /// Marks the whole task failed, recording `reason` against every item
    /// that has no outcome yet.
    pub(crate) fn fail(&mut self, reason: String) {
        let pending: Vec<PathBuf> = self
            .items
            .iter()
            .skip(self.outcomes.len())
            .map(|item| item.source.clone())
            .collect();
        for source in pending {
            self.record(
                source,
                ItemOutcome::Failed {
                    error: reason.clone(),
                },
            );
        }
        self.status = TaskStatus::Failed { reason };
    }

    /// Marks the task cancelled, recording `Cancelled` for every item that
    /// has no outcome yet.
    pub(crate) fn cancel_remaining(&mut self) {
        let pending: Vec<PathBuf> = self
            .items
            .iter()
            .skip(self.outcomes.len())
            .map(|item| item.source.clone())
            .collect();
        for source in pending {
            self.record(source, ItemOutcome::Cancelled);
        }
        self.status = TaskStatus::Cancelled;
    }
}

fn into_dir(sources: Vec<PathBuf>, dest_dir: &Path) -> Vec<OperationItem> {
    sources
        .into_iter()
        .map(|source| {
            let destination = source.file_name().map(|name| dest_dir.join(name));
            OperationItem::new(source, destination)
        })
        .collect()
}

/// Read-only snapshot of a task handed to callers and event listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub kind: OperationKind,
    pub status: TaskStatus,
    pub outcomes: Vec<ItemResult>,
}

impl TaskReport {
    pub fn succeeded(&self) -> usize {
        self.count(ItemOutcome::is_success)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemOutcome::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped { .. }))
    }

    pub fn outcome(&self, source: &Path) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Io(e.into()))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl From<&OperationTask> for TaskReport {
    fn from(task: &OperationTask) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            status: task.status.clone(),
            outcomes: task.outcomes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn copy_targets_keep_file_names() {
        let task = OperationTask::copy(
            vec![PathBuf::from("/src/a.txt"), PathBuf::from("/src/dir")],
            Path::new("/dest"),
            ConflictPolicy::Skip,
        );

        assert_eq!(task.kind(), OperationKind::Copy);
        assert_eq!(task.status(), &TaskStatus::Pending);
        assert_eq!(
            task.items()[0].destination,
            Some(PathBuf::from("/dest/a.txt"))
        );
        assert_eq!(task.items()[1].destination, Some(PathBuf::from("/dest/dir")));
    }

    #[test]
    fn rename_destination_is_a_sibling() {
        let task =
            OperationTask::rename(PathBuf::from("/d/old.txt"), "new.txt", ConflictPolicy::Skip);
        assert_eq!(task.items()[0].destination, Some(PathBuf::from("/d/new.txt")));
    }

    #[test]
    fn delete_carries_permanent_flag() {
        let task = OperationTask::delete(vec![PathBuf::from("/a")], true);
        assert!(task.permanent_delete());
        assert_eq!(task.items()[0].destination, None);
    }

    #[test]
    fn fail_records_every_pending_item() {
        let mut task = OperationTask::delete(vec![PathBuf::from("/a"), PathBuf::from("/b")], false);
        task.record(PathBuf::from("/a"), ItemOutcome::Cancelled);

        task.fail("no destination".to_string());

        assert_eq!(task.outcomes().len(), 2);
        assert!(matches!(task.outcome(Path::new("/b")), Some(ItemOutcome::Failed { .. })));
        assert!(matches!(task.status(), TaskStatus::Failed { .. }));
    }

    #[test]
    fn cancel_remaining_keeps_finished_outcomes() {
        let mut task = OperationTask::delete(vec![PathBuf::from("/a"), PathBuf::from("/b")], true);
        task.record(PathBuf::from("/a"), ItemOutcome::Done { destination: None });

        task.cancel_remaining();

        assert_eq!(task.status(), &TaskStatus::Cancelled);
        assert_eq!(
            task.outcome(Path::new("/a")),
            Some(&ItemOutcome::Done { destination: None })
        );
        assert_eq!(task.outcome(Path::new("/b")), Some(&ItemOutcome::Cancelled));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Failed {
            reason: String::new()
        }
        .is_terminal());
    }

    #[test]
    fn report_counts_and_json() {
        let mut task = OperationTask::copy(
            vec![PathBuf::from("/s/a"), PathBuf::from("/s/b"), PathBuf::from("/s/c")],
            Path::new("/d"),
            ConflictPolicy::Skip,
        );
        task.record(
            PathBuf::from("/s/a"),
            ItemOutcome::Done {
                destination: Some(PathBuf::from("/d/a")),
            },
        );
        task.record(
            PathBuf::from("/s/b"),
            ItemOutcome::Skipped {
                reason: SkipReason::AlreadyExists,
            },
        );
        task.record(
            PathBuf::from("/s/c"),
            ItemOutcome::Failed {
                error: "permission denied: /s/c".to_string(),
            },
        );
        task.set_status(TaskStatus::PartiallyFailed);

        let report = task.report();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "copy");
        assert_eq!(value["status"]["status"], "partially_failed");
        assert_eq!(value["outcomes"][1]["outcome"], "skipped");
        assert_eq!(value["outcomes"][1]["reason"], "already_exists");
    }
}
