//! Asynchronous front end of the executor.
//!
//! [`OperationEngine::submit`] returns immediately with a [`TaskHandle`].
//! The task first waits for the prefix locks of its paths (status
//! `Pending`), then runs on tokio's blocking pool (status `Running`) and
//! finally publishes its terminal report. Tasks with disjoint paths run
//! concurrently; overlapping ones run in submission order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::event::{emit, EventSender, OperationEvent};
use crate::fs::ops;
use crate::ops::executor::{execute, ExecutionContext, ExecutorOptions};
use crate::ops::lock::{LockSet, PrefixLockTable};
use crate::ops::task::{OperationTask, TaskId, TaskReport, TaskStatus};
use crate::trash::TrashAdapter;

/// Caller-side view of a submitted task: live status plus cancellation.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    cancel: CancellationToken,
    report: watch::Receiver<TaskReport>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.report.borrow().status.clone()
    }

    /// Latest published report. Outcomes are filled in once the task ends.
    pub fn snapshot(&self) -> TaskReport {
        self.report.borrow().clone()
    }

    /// Requests cancellation. The task stops at the next item boundary or
    /// copy chunk.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the task to reach a terminal status.
    pub async fn wait(&self) -> TaskReport {
        let mut rx = self.report.clone();
        loop {
            {
                let report = rx.borrow_and_update();
                if report.status.is_terminal() {
                    return report.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

#[derive(Debug)]
struct TaskEntry {
    cancel: CancellationToken,
    report: watch::Receiver<TaskReport>,
}

/// Runs [`OperationTask`]s off the caller's thread.
///
/// Cloning is cheap; clones share the task table and lock table.
#[derive(Debug, Clone)]
pub struct OperationEngine {
    runtime: Handle,
    trash: Arc<TrashAdapter>,
    options: Arc<ExecutorOptions>,
    locks: Arc<PrefixLockTable>,
    tasks: Arc<Mutex<HashMap<TaskId, TaskEntry>>>,
    events: Option<EventSender>,
}

impl OperationEngine {
    pub fn new(runtime: Handle, trash: TrashAdapter, options: ExecutorOptions) -> Self {
        Self {
            runtime,
            trash: Arc::new(trash),
            options: Arc::new(options),
            locks: Arc::new(PrefixLockTable::new()),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            events: None,
        }
    }

    /// Returns an engine that reports progress on `events`.
    pub fn with_events(self, events: EventSender) -> Self {
        Self {
            events: Some(events),
            ..self
        }
    }

    pub fn trash(&self) -> &TrashAdapter {
        &self.trash
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Queues `task` and returns its handle without waiting.
    pub fn submit(&self, task: OperationTask) -> TaskHandle {
        let id = task.id();
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(task.report());

        self.locks.enqueue(id, LockSet::for_task(&task));
        self.tasks_lock().insert(
            id,
            TaskEntry {
                cancel: cancel.clone(),
                report: rx.clone(),
            },
        );
        emit(
            self.events.as_ref(),
            OperationEvent::TaskQueued {
                id,
                kind: task.kind(),
            },
        );

        let job = TaskJob {
            trash: Arc::clone(&self.trash),
            options: Arc::clone(&self.options),
            locks: Arc::clone(&self.locks),
            events: self.events.clone(),
            cancel: cancel.clone(),
            report: tx,
        };
        self.runtime.spawn(job.run(task));

        TaskHandle {
            id,
            cancel,
            report: rx,
        }
    }

    /// Requests cancellation of task `id`.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownTask`] if `id` was never submitted here.
    pub fn cancel(&self, id: TaskId) -> CoreResult<()> {
        let tasks = self.tasks_lock();
        let entry = tasks.get(&id).ok_or(CoreError::UnknownTask(id))?;
        entry.cancel.cancel();
        Ok(())
    }

    pub fn query_status(&self, id: TaskId) -> CoreResult<TaskStatus> {
        Ok(self.report(id)?.status)
    }

    pub fn report(&self, id: TaskId) -> CoreResult<TaskReport> {
        let tasks = self.tasks_lock();
        let entry = tasks.get(&id).ok_or(CoreError::UnknownTask(id))?;
        let report = entry.report.borrow().clone();
        Ok(report)
    }

    /// Drops finished tasks from the table. Returns how many were removed.
    pub fn forget_finished(&self) -> usize {
        let mut tasks = self.tasks_lock();
        let before = tasks.len();
        tasks.retain(|_, entry| !entry.report.borrow().status.is_terminal());
        before - tasks.len()
    }

    /// Creates an empty directory `name` in `parent`.
    pub fn create_directory(&self, parent: &Path, name: &str) -> CoreResult<PathBuf> {
        let created = ops::create_directory(parent, name)?;
        tracing::info!("created directory {}", created.display());
        Ok(created)
    }

    /// Creates an empty file `name` in `parent`.
    pub fn create_file(&self, parent: &Path, name: &str) -> CoreResult<PathBuf> {
        let created = ops::create_file(parent, name)?;
        tracing::info!("created file {}", created.display());
        Ok(created)
    }

    fn tasks_lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State moved into the spawned future of one task.
struct TaskJob {
    trash: Arc<TrashAdapter>,
    options: Arc<ExecutorOptions>,
    locks: Arc<PrefixLockTable>,
    events: Option<EventSender>,
    cancel: CancellationToken,
    report: watch::Sender<TaskReport>,
}

impl TaskJob {
    async fn run(self, mut task: OperationTask) {
        let id = task.id();
        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.locks.acquire(id) => true,
        };
        if !acquired {
            self.locks.release(id);
            task.cancel_remaining();
            tracing::info!("task {id} cancelled while queued");
            self.finish(&task);
            return;
        }

        task.set_status(TaskStatus::Running);
        self.report.send_replace(task.report());
        tracing::info!("{} task {id} started: {} item(s)", task.kind(), task.items().len());
        emit(
            self.events.as_ref(),
            OperationEvent::TaskStarted {
                id,
                total_items: task.items().len(),
            },
        );

        let fallback = task.clone();
        let trash = Arc::clone(&self.trash);
        let options = Arc::clone(&self.options);
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let ctx = ExecutionContext {
                trash: &trash,
                cancel: &cancel,
                options: &options,
                events: events.as_ref(),
            };
            execute(task, &ctx)
        })
        .await;

        let task = match joined {
            Ok(task) => task,
            Err(e) => {
                let mut task = fallback;
                task.fail(format!("worker stopped: {e}"));
                task
            }
        };
        self.locks.release(id);
        self.finish(&task);
    }

    fn finish(&self, task: &OperationTask) {
        let report = task.report();
        match &report.status {
            TaskStatus::Failed { reason } => {
                tracing::warn!("task {} failed: {reason}", report.id)
            }
            status => tracing::info!(
                "task {} finished: {:?} ({} ok, {} skipped, {} failed)",
                report.id,
                status,
                report.succeeded(),
                report.skipped(),
                report.failed()
            ),
        }
        emit(
            self.events.as_ref(),
            OperationEvent::TaskFinished {
                report: report.clone(),
            },
        );
        self.report.send_replace(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task::{ConflictPolicy, ItemOutcome};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn engine(tmp: &TempDir) -> OperationEngine {
        OperationEngine::new(
            Handle::current(),
            TrashAdapter::with_home_trash(tmp.path().join("Trash")),
            ExecutorOptions::default(),
        )
    }

    async fn wait(handle: &TaskHandle) -> TaskReport {
        tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("task did not finish")
    }

    #[tokio::test]
    async fn submit_runs_task_to_completion() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let src = tmp.path().join("a.txt");
        fs::write(&src, "hello").unwrap();
        let dest = tmp.path().join("out");

        let handle = engine.submit(OperationTask::copy(
            vec![src.clone()],
            &dest,
            ConflictPolicy::Skip,
        ));
        let report = wait(&handle).await;

        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "hello");
        assert_eq!(engine.query_status(handle.id()).unwrap(), TaskStatus::Completed);
        assert_eq!(engine.report(handle.id()).unwrap(), report);
    }

    #[tokio::test]
    async fn unknown_task_is_reported() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let id = TaskId::new();

        assert!(matches!(engine.query_status(id), Err(CoreError::UnknownTask(_))));
        assert!(matches!(engine.cancel(id), Err(CoreError::UnknownTask(_))));
    }

    #[tokio::test]
    async fn events_trace_task_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = engine(&tmp).with_events(tx);
        let src = tmp.path().join("a.txt");
        fs::write(&src, "hello").unwrap();

        let handle = engine.submit(OperationTask::delete(vec![src.clone()], false));
        wait(&handle).await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.task_id(), handle.id());
            names.push(match event {
                OperationEvent::TaskQueued { .. } => "queued",
                OperationEvent::TaskStarted { .. } => "started",
                OperationEvent::ItemStarted { .. } => "item_started",
                OperationEvent::BytesCopied { .. } => "bytes",
                OperationEvent::ItemFinished { .. } => "item_finished",
                OperationEvent::TaskFinished { .. } => "finished",
            });
        }
        assert_eq!(
            names,
            ["queued", "started", "item_started", "item_finished", "finished"]
        );
    }

    #[tokio::test]
    async fn overlapping_task_waits_in_pending() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let dir = tmp.path().join("a");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f.txt"), "x").unwrap();

        // Hold the locks of /a through a task that is stuck in the table.
        let blocker = TaskId::new();
        engine.locks.enqueue(blocker, LockSet::new([dir.clone()]));
        assert!(engine.locks.try_acquire(blocker));

        let handle = engine.submit(OperationTask::delete(vec![dir.join("f.txt")], false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.status(), TaskStatus::Pending);
        assert!(dir.join("f.txt").exists());

        engine.locks.release(blocker);
        let report = wait(&handle).await;
        assert_eq!(report.status, TaskStatus::Completed);
        assert!(!dir.join("f.txt").exists());
    }

    #[tokio::test]
    async fn overlapping_tasks_run_in_submission_order() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let src = tmp.path().join("a");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("f.txt"), "x").unwrap();
        let dest = tmp.path().join("copy");

        // Copy first, then delete the source: the copy must see it.
        let copy = engine.submit(OperationTask::copy(
            vec![src.clone()],
            &dest,
            ConflictPolicy::Skip,
        ));
        let delete = engine.submit(OperationTask::delete(vec![src.clone()], true));

        let copied = wait(&copy).await;
        let deleted = wait(&delete).await;

        assert_eq!(copied.status, TaskStatus::Completed);
        assert_eq!(deleted.status, TaskStatus::Completed);
        assert_eq!(fs::read_to_string(dest.join("a/f.txt")).unwrap(), "x");
        assert!(!src.exists());
    }

    #[tokio::test]
    async fn cancel_while_queued_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        let blocker = TaskId::new();
        engine.locks.enqueue(blocker, LockSet::new([file.clone()]));
        assert!(engine.locks.try_acquire(blocker));

        let handle = engine.submit(OperationTask::delete(vec![file.clone()], true));
        engine.cancel(handle.id()).unwrap();
        let report = wait(&handle).await;

        assert_eq!(report.status, TaskStatus::Cancelled);
        assert_eq!(report.outcome(&file), Some(&ItemOutcome::Cancelled));
        assert!(file.exists());
        assert_eq!(engine.locks.waiting_count(), 0);
    }

    #[tokio::test]
    async fn forget_finished_prunes_terminal_tasks() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        let handle = engine.submit(OperationTask::delete(vec![file], true));
        wait(&handle).await;

        assert_eq!(engine.forget_finished(), 1);
        assert!(matches!(
            engine.query_status(handle.id()),
            Err(CoreError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn create_commands_reject_existing_names() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);

        let dir = engine.create_directory(tmp.path(), "new").unwrap();
        assert!(dir.is_dir());
        let file = engine.create_file(&dir, "note.txt").unwrap();
        assert!(file.is_file());

        assert!(matches!(
            engine.create_directory(tmp.path(), "new"),
            Err(CoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            engine.create_file(&dir, "note.txt"),
            Err(CoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            engine.create_file(&dir, "a/b"),
            Err(CoreError::InvalidName(_))
        ));
    }
}
