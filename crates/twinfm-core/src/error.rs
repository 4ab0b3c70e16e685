//! Error types for `twinfm-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ops::task::TaskId;

/// Unified error type for all core operations.
///
/// Each variant captures just enough context for the caller to display
/// a meaningful message or take corrective action.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The target path does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to access the path.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A directory was expected but the path points to something else.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The destination of a create, copy or rename is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A file or directory name is invalid (empty, contains path separators, etc.).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A rename crossed a filesystem boundary.
    ///
    /// Only used internally to trigger the copy-then-delete fallback of a
    /// move; never reported as an item failure.
    #[error("cross-device move: {from} -> {to}")]
    CrossDeviceMove { from: PathBuf, to: PathBuf },

    /// The storage holding the path has no space left.
    #[error("disk full: {0}")]
    DiskFull(PathBuf),

    /// No trash facility is available for the path's filesystem.
    #[error("trash unsupported for: {0}")]
    Unsupported(PathBuf),

    /// Back or forward was requested with an empty history stack.
    #[error("no navigation history")]
    NoHistory,

    /// Up was requested while already at the filesystem root.
    #[error("already at filesystem root")]
    AtRoot,

    /// The operation was cancelled before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A copied file does not match its source.
    #[error("verification failed: {0}")]
    VerificationFailed(PathBuf),

    /// A directory was asked to be copied or moved into itself.
    #[error("cannot copy a directory into itself: {0}")]
    RecursiveCopy(PathBuf),

    /// A FIFO, socket or device node was met where a copy needs data.
    #[error("cannot copy special file: {0}")]
    SpecialFile(PathBuf),

    /// A `.trashinfo` record could not be parsed.
    #[error("malformed trash info: {0}")]
    TrashInfo(String),

    /// Paste was requested with nothing copied or cut.
    #[error("clipboard is empty")]
    ClipboardEmpty,

    /// No task with the given id is known to the engine.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Classifies an I/O error raised while touching `path`.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(path),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            ErrorKind::NotADirectory => Self::NotADirectory(path),
            ErrorKind::StorageFull => Self::DiskFull(path),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` for errors that mean "stop", not "this item failed".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Returns `true` if `err` is the EXDEV condition raised by `rename(2)`.
pub(crate) fn is_cross_device(err: &std::io::Error) -> bool {
    if err.kind() == ErrorKind::CrossesDevices {
        return true;
    }
    // EXDEV
    #[cfg(unix)]
    if err.raw_os_error() == Some(18) {
        return true;
    }
    false
}

/// Convenience alias used throughout `twinfm-core`.
pub type CoreResult<T> = Result<T, CoreError>;
