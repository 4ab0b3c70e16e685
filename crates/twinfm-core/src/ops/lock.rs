//! Prefix lock table serializing tasks whose path sets overlap.
//!
//! Two tasks conflict when a path of one equals, contains or lies inside
//! a path of the other (component-wise, so `/a` and `/ab` do not clash).
//! A conflicting task is queued until the earlier one releases its
//! locks; tasks are admitted in submission order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::fs::path::{absolute, paths_overlap};
use crate::ops::task::{OperationKind, OperationTask, TaskId};

/// Normalised absolute paths a task needs exclusive access to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    paths: Vec<PathBuf>,
}

impl LockSet {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut set = Self::default();
        for path in paths {
            set.insert(&path);
        }
        set
    }

    /// Every source and destination of `task`, plus the destination
    /// parent for copy and move.
    pub fn for_task(task: &OperationTask) -> Self {
        let mut set = Self::default();
        for item in task.items() {
            set.insert(&item.source);
            if let Some(dest) = &item.destination {
                set.insert(dest);
                if matches!(task.kind(), OperationKind::Copy | OperationKind::Move) {
                    if let Some(parent) = dest.parent() {
                        set.insert(parent);
                    }
                }
            }
        }
        set
    }

    fn insert(&mut self, path: &Path) {
        let path = absolute(path);
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn conflicts_with(&self, other: &LockSet) -> bool {
        self.paths
            .iter()
            .any(|a| other.paths.iter().any(|b| paths_overlap(a, b)))
    }
}

#[derive(Debug, Default)]
struct LockState {
    held: Vec<(TaskId, LockSet)>,
    waiting: VecDeque<(TaskId, LockSet)>,
}

/// Table of held and queued lock sets.
#[derive(Debug, Default)]
pub struct PrefixLockTable {
    state: Mutex<LockState>,
    released: Notify,
}

impl PrefixLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `id` behind every task enqueued before it.
    pub fn enqueue(&self, id: TaskId, set: LockSet) {
        self.lock().waiting.push_back((id, set));
    }

    /// Takes the locks of queued task `id` if nothing held, and nothing
    /// queued ahead of it, overlaps its paths.
    pub fn try_acquire(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.waiting.iter().position(|(queued, _)| *queued == id) else {
            // Not queued: either already holding or never enqueued.
            return state.held.iter().any(|(held, _)| *held == id);
        };
        let set = &state.waiting[pos].1;
        let blocked = state.held.iter().any(|(_, other)| set.conflicts_with(other))
            || state
                .waiting
                .iter()
                .take(pos)
                .any(|(_, other)| set.conflicts_with(other));
        if blocked {
            return false;
        }
        if let Some(entry) = state.waiting.remove(pos) {
            state.held.push(entry);
        }
        true
    }

    /// Waits until [`try_acquire`](Self::try_acquire) succeeds for `id`.
    pub async fn acquire(&self, id: TaskId) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.try_acquire(id) {
                return;
            }
            tracing::debug!("task {id} waiting for overlapping task to finish");
            notified.await;
        }
    }

    /// Drops the locks (or queue slot) of `id` and wakes waiting tasks.
    pub fn release(&self, id: TaskId) {
        {
            let mut state = self.lock();
            state.held.retain(|(held, _)| *held != id);
            state.waiting.retain(|(queued, _)| *queued != id);
        }
        self.released.notify_waiters();
    }

    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.lock().waiting.len()
    }

    fn lock(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task::ConflictPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn set(paths: &[&str]) -> LockSet {
        LockSet::new(paths.iter().map(PathBuf::from))
    }

    #[test]
    fn overlap_is_component_wise() {
        assert!(set(&["/a"]).conflicts_with(&set(&["/a/b"])));
        assert!(set(&["/a/b"]).conflicts_with(&set(&["/a"])));
        assert!(set(&["/a"]).conflicts_with(&set(&["/a"])));
        assert!(!set(&["/a"]).conflicts_with(&set(&["/ab"])));
        assert!(!set(&["/x", "/y"]).conflicts_with(&set(&["/z"])));
    }

    #[test]
    fn lock_set_normalises_paths() {
        let locks = set(&["/a/./b/../c", "/a/c"]);
        assert_eq!(locks.paths(), &[PathBuf::from("/a/c")]);
    }

    #[test]
    fn copy_locks_sources_destinations_and_parent() {
        let task = OperationTask::copy(
            vec![PathBuf::from("/src/a.txt")],
            Path::new("/dest"),
            ConflictPolicy::Skip,
        );

        let locks = LockSet::for_task(&task);

        assert_eq!(
            locks.paths(),
            &[
                PathBuf::from("/src/a.txt"),
                PathBuf::from("/dest/a.txt"),
                PathBuf::from("/dest"),
            ]
        );
    }

    #[test]
    fn conflicting_task_waits_for_release() {
        let table = PrefixLockTable::new();
        let first = TaskId::new();
        let second = TaskId::new();
        table.enqueue(first, set(&["/a"]));
        table.enqueue(second, set(&["/a/b"]));

        assert!(table.try_acquire(first));
        assert!(!table.try_acquire(second));

        table.release(first);
        assert!(table.try_acquire(second));
        assert_eq!(table.held_count(), 1);
    }

    #[test]
    fn disjoint_tasks_run_together() {
        let table = PrefixLockTable::new();
        let first = TaskId::new();
        let second = TaskId::new();
        table.enqueue(first, set(&["/a"]));
        table.enqueue(second, set(&["/b"]));

        assert!(table.try_acquire(second));
        assert!(table.try_acquire(first));
        assert_eq!(table.held_count(), 2);
    }

    #[test]
    fn later_task_cannot_overtake_queued_conflict() {
        let table = PrefixLockTable::new();
        let running = TaskId::new();
        let queued = TaskId::new();
        let late = TaskId::new();
        table.enqueue(running, set(&["/a"]));
        table.enqueue(queued, set(&["/a", "/b"]));
        table.enqueue(late, set(&["/b"]));

        assert!(table.try_acquire(running));
        assert!(!table.try_acquire(queued));
        assert!(!table.try_acquire(late));
    }

    #[test]
    fn release_of_queued_task_drops_its_slot() {
        let table = PrefixLockTable::new();
        let id = TaskId::new();
        table.enqueue(id, set(&["/a"]));

        table.release(id);

        assert_eq!(table.waiting_count(), 0);
        assert!(!table.try_acquire(id));
    }

    #[tokio::test]
    async fn acquire_wakes_after_release() {
        let table = Arc::new(PrefixLockTable::new());
        let first = TaskId::new();
        let second = TaskId::new();
        table.enqueue(first, set(&["/a"]));
        table.enqueue(second, set(&["/a"]));
        table.acquire(first).await;

        let waiter = {
            let table = Arc::clone(&table);
            tokio::spawn(async move { table.acquire(second).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        table.release(first);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(table.held_count(), 1);
    }
}
