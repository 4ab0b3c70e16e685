//! TwinFM core library: the file operation and navigation engine behind a
//! dual-pane file browser.
//!
//! `twinfm-core` is UI-agnostic. A front end drives a [`Session`] (or the
//! components directly) and renders what comes back; progress flows to it
//! only through the [`OperationEvent`] channel it hands in.
//!
//! # Modules
//!
//! - [`fs`] — Entry snapshots, directory listing, atomic copy and other filesystem primitives.
//! - [`nav`] — Per-pane [`PathNavigator`] with back/forward [`History`].
//! - [`trash`] — freedesktop.org trash support ([`TrashAdapter`]).
//! - [`ops`] — Operation tasks, their executor and the async [`OperationEngine`].
//! - [`clipboard`] — Copy/cut clipboard owned by the session.
//! - [`session`] — Two panes, clipboard and engine behind one command surface.
//! - [`event`] — Progress and result notifications.
//! - [`config`] — TOML configuration.
//! - [`error`] — Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod clipboard;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod nav;
pub mod ops;
pub mod session;
pub mod trash;

pub use clipboard::{Clipboard, ClipboardMode};
pub use config::settings::Config;
pub use error::{CoreError, CoreResult};
pub use event::{EventSender, OperationEvent};
pub use fs::entry::{Entry, EntryKind};
pub use fs::lister::{list_directory, sort_entries, ListOptions};
pub use nav::history::History;
pub use nav::navigator::PathNavigator;
pub use ops::{
    ConflictPolicy, ExecutorOptions, ItemOutcome, OperationEngine, OperationKind, OperationTask,
    SkipReason, TaskHandle, TaskId, TaskReport, TaskStatus,
};
pub use session::{PaneId, Session};
pub use trash::{TrashAdapter, TrashRecord};

/// Normalises a string to NFC (composed) form.
///
/// macOS stores filenames in NFD (decomposed), which causes Korean Hangul
/// characters to appear as individual Jamo. This helper re-composes them.
pub fn nfc_string(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}
