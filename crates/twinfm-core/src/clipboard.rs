//! Session-owned copy/cut clipboard.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ops::task::{ConflictPolicy, OperationTask};
use crate::session::PaneId;

/// Whether a paste copies or moves the clipboard's sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardMode {
    Copy,
    Cut,
}

/// Paths picked by a copy or cut, waiting for a paste.
///
/// Replaced wholesale by every copy/cut. Sources keep their selection
/// order; duplicates are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clipboard {
    mode: ClipboardMode,
    sources: Vec<PathBuf>,
    origin: PaneId,
}

impl Clipboard {
    pub fn new(mode: ClipboardMode, sources: Vec<PathBuf>, origin: PaneId) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(sources.len());
        for source in sources {
            if !unique.contains(&source) {
                unique.push(source);
            }
        }
        Self {
            mode,
            sources: unique,
            origin,
        }
    }

    pub fn copy(sources: Vec<PathBuf>, origin: PaneId) -> Self {
        Self::new(ClipboardMode::Copy, sources, origin)
    }

    pub fn cut(sources: Vec<PathBuf>, origin: PaneId) -> Self {
        Self::new(ClipboardMode::Cut, sources, origin)
    }

    pub fn mode(&self) -> ClipboardMode {
        self.mode
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn origin(&self) -> PaneId {
        self.origin
    }

    pub fn is_cut(&self) -> bool {
        self.mode == ClipboardMode::Cut
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The task a paste into `dest_dir` performs: copy for a copied
    /// clipboard, move for a cut one.
    pub fn paste_task(&self, dest_dir: &Path, policy: ConflictPolicy) -> OperationTask {
        match self.mode {
            ClipboardMode::Copy => OperationTask::copy(self.sources.clone(), dest_dir, policy),
            ClipboardMode::Cut => OperationTask::move_to(self.sources.clone(), dest_dir, policy),
        }
    }
}
