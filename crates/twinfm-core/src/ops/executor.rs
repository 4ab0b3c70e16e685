//! Synchronous execution of one [`OperationTask`].
//!
//! Items run in order on the calling thread. Cancellation is checked
//! between items and inside every byte copy. A cancelled item leaves no
//! partial destination; items already finished are not rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::settings::OperationsConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{emit, EventSender, OperationEvent};
use crate::fs::ops::{
    copy_atomic, copy_verified, exists, remove_path, rename_path, replace_path, same_entry,
    unique_name, Transfer, DEFAULT_CHUNK_SIZE,
};
use crate::fs::path::{is_valid_filename, resolve_path};
use crate::ops::task::{
    ConflictPolicy, ItemOutcome, OperationItem, OperationKind, OperationTask, SkipReason,
    TaskStatus,
};
use crate::trash::TrashAdapter;

/// Tuning knobs for task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub chunk_size: usize,
    /// Compare SHA-256 digests before a cross-device move removes its source.
    pub verify_checksum: bool,
    /// Treat every move as crossing filesystems (copy, verify, delete).
    pub force_cross_device: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_checksum: false,
            force_cross_device: false,
        }
    }
}

impl From<&OperationsConfig> for ExecutorOptions {
    fn from(config: &OperationsConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            verify_checksum: config.verify_checksum,
            force_cross_device: false,
        }
    }
}

/// Everything an execution borrows from its caller.
pub struct ExecutionContext<'a> {
    pub trash: &'a TrashAdapter,
    pub cancel: &'a CancellationToken,
    pub options: &'a ExecutorOptions,
    pub events: Option<&'a EventSender>,
}

/// Where an item should land, after applying the conflict policy.
enum Target {
    Proceed { path: PathBuf, replace: bool },
    Skip(SkipReason),
}

/// Runs every item of `task` and returns it with outcomes and a terminal
/// status filled in.
pub fn execute(mut task: OperationTask, ctx: &ExecutionContext<'_>) -> OperationTask {
    let id = task.id();
    if let Err(e) = prepare(&task) {
        tracing::warn!("task {id} setup failed: {e}");
        task.fail(e.to_string());
        return task;
    }

    let items = task.items().to_vec();
    let mut cancelled = false;
    for (index, item) in items.into_iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        emit(
            ctx.events,
            OperationEvent::ItemStarted {
                id,
                index,
                source: item.source.clone(),
            },
        );

        let mut on_progress = |bytes: u64| {
            emit(ctx.events, OperationEvent::BytesCopied { id, index, bytes });
        };
        let mut transfer = Transfer::new(ctx.cancel, ctx.options.chunk_size, &mut on_progress);
        let result = match task.kind() {
            OperationKind::Copy => copy_item(&item, task.conflict_policy(), &mut transfer),
            OperationKind::Move => {
                move_item(&item, task.conflict_policy(), ctx.options, &mut transfer)
            }
            OperationKind::Delete => delete_item(&item, task.permanent_delete(), ctx.trash),
            OperationKind::Rename => rename_item(&item, task.conflict_policy()),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                cancelled = true;
                ItemOutcome::Cancelled
            }
            Err(e) => {
                tracing::warn!("{} of {} failed: {e}", task.kind(), item.source.display());
                ItemOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        emit(
            ctx.events,
            OperationEvent::ItemFinished {
                id,
                index,
                source: item.source.clone(),
                outcome: outcome.clone(),
            },
        );
        task.record(item.source, outcome);
        if cancelled {
            break;
        }
    }

    if cancelled {
        task.cancel_remaining();
    } else if task.outcomes().iter().any(|r| r.outcome.is_failure()) {
        task.set_status(TaskStatus::PartiallyFailed);
    } else {
        task.set_status(TaskStatus::Completed);
    }
    task
}

/// Setup phase: creates the destination directories copy and move need.
fn prepare(task: &OperationTask) -> CoreResult<()> {
    if !matches!(task.kind(), OperationKind::Copy | OperationKind::Move) {
        return Ok(());
    }
    for item in task.items() {
        let Some(parent) = item.destination.as_deref().and_then(Path::parent) else {
            continue;
        };
        fs::create_dir_all(parent).map_err(|e| CoreError::from_io(e, parent))?;
    }
    Ok(())
}

fn destination_of(item: &OperationItem) -> CoreResult<&Path> {
    item.destination.as_deref().ok_or_else(|| {
        CoreError::InvalidName(format!("no destination for {}", item.source.display()))
    })
}

/// Applies `policy` to a copy or move of `source` onto `dest`.
///
/// Paths are compared after symlinked and `..` parents are resolved, so an
/// alias of the source counts as the source.
fn resolve_target(
    source: &Path,
    source_is_dir: bool,
    dest: &Path,
    policy: ConflictPolicy,
    duplicate_in_place: bool,
) -> CoreResult<Target> {
    if same_entry(source, dest) {
        return Ok(if duplicate_in_place && policy == ConflictPolicy::Rename {
            Target::Proceed {
                path: unique_name(dest),
                replace: false,
            }
        } else {
            Target::Skip(SkipReason::SameFile)
        });
    }
    let (real_source, real_dest) = (resolve_path(source), resolve_path(dest));
    // Replacing an ancestor would destroy the source itself.
    let replaces_ancestor = real_source.starts_with(&real_dest);
    let into_itself = source_is_dir && real_dest.starts_with(&real_source);
    if replaces_ancestor || into_itself {
        return Err(CoreError::RecursiveCopy(source.to_path_buf()));
    }
    if !exists(dest) {
        return Ok(Target::Proceed {
            path: dest.to_path_buf(),
            replace: false,
        });
    }
    Ok(match policy {
        ConflictPolicy::Skip => Target::Skip(SkipReason::AlreadyExists),
        ConflictPolicy::Overwrite => Target::Proceed {
            path: dest.to_path_buf(),
            replace: true,
        },
        ConflictPolicy::Rename => Target::Proceed {
            path: unique_name(dest),
            replace: false,
        },
    })
}

fn copy_item(
    item: &OperationItem,
    policy: ConflictPolicy,
    transfer: &mut Transfer<'_>,
) -> CoreResult<ItemOutcome> {
    let source = &item.source;
    let meta = fs::symlink_metadata(source).map_err(|e| CoreError::from_io(e, source))?;
    let dest = destination_of(item)?;
    let (target, replace) = match resolve_target(source, meta.is_dir(), dest, policy, true)? {
        Target::Proceed { path, replace } => (path, replace),
        Target::Skip(reason) => return Ok(ItemOutcome::Skipped { reason }),
    };

    let bytes = copy_atomic(source, &target, replace, transfer)?;
    tracing::debug!(
        "copied {} -> {} ({bytes} bytes)",
        source.display(),
        target.display()
    );
    Ok(ItemOutcome::Done {
        destination: Some(target),
    })
}

fn move_item(
    item: &OperationItem,
    policy: ConflictPolicy,
    options: &ExecutorOptions,
    transfer: &mut Transfer<'_>,
) -> CoreResult<ItemOutcome> {
    let source = &item.source;
    let meta = fs::symlink_metadata(source).map_err(|e| CoreError::from_io(e, source))?;
    let dest = destination_of(item)?;
    let (target, replace) = match resolve_target(source, meta.is_dir(), dest, policy, false)? {
        Target::Proceed { path, replace } => (path, replace),
        Target::Skip(reason) => return Ok(ItemOutcome::Skipped { reason }),
    };

    let renamed = if options.force_cross_device {
        Err(CoreError::CrossDeviceMove {
            from: source.clone(),
            to: target.clone(),
        })
    } else if replace {
        replace_path(source, &target)
    } else {
        rename_path(source, &target)
    };

    match renamed {
        Ok(()) => {}
        Err(CoreError::CrossDeviceMove { .. }) => {
            move_across_devices(source, &target, replace, options, transfer)?;
        }
        Err(e) => return Err(e),
    }
    tracing::debug!("moved {} -> {}", source.display(), target.display());
    Ok(ItemOutcome::Done {
        destination: Some(target),
    })
}

/// Copy, verify, then remove the source. The source is untouched unless
/// the verified copy is fully in place.
fn move_across_devices(
    source: &Path,
    target: &Path,
    replace: bool,
    options: &ExecutorOptions,
    transfer: &mut Transfer<'_>,
) -> CoreResult<()> {
    tracing::debug!("{} crosses filesystems, copying instead", source.display());
    copy_verified(source, target, replace, options.verify_checksum, transfer)?;
    remove_path(source)
}

fn delete_item(
    item: &OperationItem,
    permanent: bool,
    trash: &TrashAdapter,
) -> CoreResult<ItemOutcome> {
    let source = &item.source;
    fs::symlink_metadata(source).map_err(|e| CoreError::from_io(e, source))?;
    if permanent {
        remove_path(source)?;
        tracing::info!("permanently deleted {}", source.display());
        return Ok(ItemOutcome::Done { destination: None });
    }
    match trash.trash(source) {
        Ok(record) => Ok(ItemOutcome::Trashed(record)),
        Err(CoreError::Unsupported(_)) => Ok(ItemOutcome::RequiresConfirmation),
        Err(e) => Err(e),
    }
}

fn rename_item(item: &OperationItem, policy: ConflictPolicy) -> CoreResult<ItemOutcome> {
    let source = &item.source;
    let dest = destination_of(item)?;
    let name = dest.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !is_valid_filename(name) || dest.parent() != source.parent() {
        return Err(CoreError::InvalidName(dest.display().to_string()));
    }
    fs::symlink_metadata(source).map_err(|e| CoreError::from_io(e, source))?;
    if dest == source {
        return Ok(ItemOutcome::Skipped {
            reason: SkipReason::SameFile,
        });
    }

    let (target, replace) = if exists(dest) {
        match policy {
            ConflictPolicy::Skip => {
                return Ok(ItemOutcome::Skipped {
                    reason: SkipReason::AlreadyExists,
                })
            }
            ConflictPolicy::Overwrite => (dest.to_path_buf(), true),
            ConflictPolicy::Rename => (unique_name(dest), false),
        }
    } else {
        (dest.to_path_buf(), false)
    };

    if replace {
        replace_path(source, &target)?;
    } else {
        rename_path(source, &target)?;
    }
    tracing::debug!("renamed {} -> {}", source.display(), target.display());
    Ok(ItemOutcome::Done {
        destination: Some(target),
    })
}
