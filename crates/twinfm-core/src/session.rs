//! The command surface a dual-pane front end drives.
//!
//! A [`Session`] owns both panes' navigators, the clipboard and the
//! operation engine. Front ends translate user input into calls on it and
//! redraw from what those calls return; nothing in here calls back.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::clipboard::Clipboard;
use crate::config::settings::Config;
use crate::error::{CoreError, CoreResult};
use crate::fs::entry::Entry;
use crate::fs::lister::list_directory;
use crate::nav::navigator::PathNavigator;
use crate::ops::engine::{OperationEngine, TaskHandle};
use crate::ops::executor::ExecutorOptions;
use crate::ops::task::{ConflictPolicy, OperationTask, TaskId, TaskReport, TaskStatus};
use crate::trash::TrashAdapter;

/// One of the two panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneId {
    Left,
    Right,
}

impl PaneId {
    pub fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Two panes, a clipboard and an engine.
#[derive(Debug)]
pub struct Session {
    left: PathNavigator,
    right: PathNavigator,
    active: PaneId,
    show_hidden: bool,
    clipboard: Option<Clipboard>,
    /// Paste task that clears the clipboard when it completes.
    pending_cut: Option<TaskId>,
    engine: OperationEngine,
}

impl Session {
    /// Opens both panes at `start`.
    ///
    /// # Errors
    ///
    /// Any [`PathNavigator::new`] error for `start`.
    pub fn new(config: &Config, engine: OperationEngine, start: &Path) -> CoreResult<Self> {
        let nav = PathNavigator::new(start)?.with_home(config.general.home_dir());
        Ok(Self {
            left: nav.clone(),
            right: nav,
            active: PaneId::Left,
            show_hidden: config.general.show_hidden,
            clipboard: None,
            pending_cut: None,
            engine,
        })
    }

    /// Builds the trash adapter and engine described by `config` and opens
    /// a session on them.
    pub fn from_config(config: &Config, runtime: Handle, start: &Path) -> CoreResult<Self> {
        let engine = OperationEngine::new(
            runtime,
            TrashAdapter::new(&config.trash),
            ExecutorOptions::from(&config.operations),
        );
        Self::new(config, engine, start)
    }

    pub fn pane(&self, pane: PaneId) -> &PathNavigator {
        match pane {
            PaneId::Left => &self.left,
            PaneId::Right => &self.right,
        }
    }

    pub fn active_pane(&self) -> PaneId {
        self.active
    }

    pub fn set_active_pane(&mut self, pane: PaneId) {
        self.active = pane;
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Flips hidden-file visibility for both panes and returns the new value.
    pub fn toggle_hidden(&mut self) -> bool {
        self.show_hidden = !self.show_hidden;
        self.show_hidden
    }

    pub fn engine(&self) -> &OperationEngine {
        &self.engine
    }

    // --- navigation ---

    /// Moves `pane` to `path` and returns the new listing.
    ///
    /// On error the pane keeps its previous location and history.
    pub fn navigate(&mut self, pane: PaneId, path: &Path) -> CoreResult<Vec<Entry>> {
        let next = self.pane(pane).navigate(path)?;
        self.commit(pane, next)
    }

    pub fn back(&mut self, pane: PaneId) -> CoreResult<Vec<Entry>> {
        let next = self.pane(pane).back()?;
        self.commit(pane, next)
    }

    pub fn forward(&mut self, pane: PaneId) -> CoreResult<Vec<Entry>> {
        let next = self.pane(pane).forward()?;
        self.commit(pane, next)
    }

    pub fn up(&mut self, pane: PaneId) -> CoreResult<Vec<Entry>> {
        let next = self.pane(pane).up()?;
        self.commit(pane, next)
    }

    pub fn home(&mut self, pane: PaneId) -> CoreResult<Vec<Entry>> {
        let next = self.pane(pane).home()?;
        self.commit(pane, next)
    }

    /// Lists the current directory of `pane`.
    pub fn list(&self, pane: PaneId) -> CoreResult<Vec<Entry>> {
        list_directory(self.pane(pane).current(), self.show_hidden)
    }

    /// Lists the new location first so a failed listing leaves the pane
    /// untouched.
    fn commit(&mut self, pane: PaneId, next: PathNavigator) -> CoreResult<Vec<Entry>> {
        let entries = list_directory(next.current(), self.show_hidden)?;
        match pane {
            PaneId::Left => self.left = next,
            PaneId::Right => self.right = next,
        }
        Ok(entries)
    }

    // --- clipboard ---

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    pub fn copy(&mut self, pane: PaneId, paths: Vec<PathBuf>) {
        self.clipboard = Some(Clipboard::copy(paths, pane));
        self.pending_cut = None;
    }

    pub fn cut(&mut self, pane: PaneId, paths: Vec<PathBuf>) {
        self.clipboard = Some(Clipboard::cut(paths, pane));
        self.pending_cut = None;
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
        self.pending_cut = None;
    }

    /// Pastes the clipboard into the current directory of `pane`.
    ///
    /// # Errors
    ///
    /// [`CoreError::ClipboardEmpty`] if nothing was copied or cut.
    pub fn paste(&mut self, pane: PaneId, policy: ConflictPolicy) -> CoreResult<TaskHandle> {
        let clipboard = self
            .clipboard
            .as_ref()
            .filter(|c| !c.is_empty())
            .ok_or(CoreError::ClipboardEmpty)?;
        let task = clipboard.paste_task(self.pane(pane).current(), policy);
        let is_cut = clipboard.is_cut();
        let handle = self.engine.submit(task);
        if is_cut {
            self.pending_cut = Some(handle.id());
        }
        Ok(handle)
    }

    /// Call once a paste task has finished. A cut is consumed only by a
    /// paste that completed; returns `true` if the clipboard was cleared.
    pub fn settle_paste(&mut self, handle: &TaskHandle) -> bool {
        if self.pending_cut != Some(handle.id()) {
            return false;
        }
        match handle.status() {
            TaskStatus::Completed => {
                self.clear_clipboard();
                true
            }
            status if status.is_terminal() => {
                self.pending_cut = None;
                false
            }
            _ => false,
        }
    }

    // --- operations ---

    /// Trashes `paths`, or removes them outright with `permanent`.
    pub fn delete(&self, paths: Vec<PathBuf>, permanent: bool) -> TaskHandle {
        self.engine.submit(OperationTask::delete(paths, permanent))
    }

    pub fn rename(&self, path: PathBuf, new_name: &str, policy: ConflictPolicy) -> TaskHandle {
        self.engine.submit(OperationTask::rename(path, new_name, policy))
    }

    /// Creates directory `name` in the current directory of `pane`.
    pub fn new_folder(&self, pane: PaneId, name: &str) -> CoreResult<PathBuf> {
        self.engine.create_directory(self.pane(pane).current(), name)
    }

    /// Creates empty file `name` in the current directory of `pane`.
    pub fn new_file(&self, pane: PaneId, name: &str) -> CoreResult<PathBuf> {
        self.engine.create_file(self.pane(pane).current(), name)
    }

    pub fn submit(&self, task: OperationTask) -> TaskHandle {
        self.engine.submit(task)
    }

    pub fn cancel(&self, id: TaskId) -> CoreResult<()> {
        self.engine.cancel(id)
    }

    pub fn query_status(&self, id: TaskId) -> CoreResult<TaskStatus> {
        self.engine.query_status(id)
    }

    pub fn report(&self, id: TaskId) -> CoreResult<TaskReport> {
        self.engine.report(id)
    }
}
