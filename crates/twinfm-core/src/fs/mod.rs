//! File system layer.
//!
//! Entry snapshots ([`entry::Entry`]), directory listing
//! ([`lister::list_directory`]), path helpers ([`path`]) and the
//! copy/rename/remove primitives the operation engine is built on ([`ops`]).

pub mod entry;
pub mod lister;
pub mod ops;
pub mod path;

pub use entry::{Entry, EntryKind};
pub use lister::{list_directory, ListOptions};
