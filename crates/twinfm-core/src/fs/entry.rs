//! Directory entry representation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Names starting with this marker are hidden.
pub const HIDDEN_MARKER: char = '.';

/// Semantic kind of an entry. Rendering (icons, colours) is left to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

impl EntryKind {
    /// Classifies metadata obtained **without** following symlinks.
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let ft = metadata.file_type();
        if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }
}

/// A single directory entry.
///
/// `Entry` is an immutable snapshot taken at listing time; listings
/// re-create every entry. Directory sizes are reported as `0`.
///
/// # Examples
///
/// ```no_run
/// use twinfm_core::Entry;
/// use std::fs;
///
/// let metadata = fs::symlink_metadata("Cargo.toml").unwrap();
/// let entry = Entry::new("Cargo.toml".into(), &metadata);
/// assert_eq!(entry.name(), "Cargo.toml");
/// assert!(!entry.is_dir());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    path: PathBuf,
    name: String,
    kind: EntryKind,
    size: u64,
    modified: Option<SystemTime>,
    is_hidden: bool,
}

impl Entry {
    /// Creates a new `Entry` from a path and its (non-following) metadata.
    pub fn new(path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| crate::nfc_string(&n.to_string_lossy()))
            .unwrap_or_default();
        let kind = EntryKind::from_metadata(metadata);
        let is_hidden = name.starts_with(HIDDEN_MARKER);

        Self {
            path,
            name,
            kind,
            size: if kind == EntryKind::Directory {
                0
            } else {
                metadata.len()
            },
            modified: metadata.modified().ok(),
            is_hidden,
        }
    }

    /// Returns the full path of this entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the last path component, NFC-normalised.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Returns the size in bytes. Always `0` for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last-modified time, if available.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Returns `true` only for real directories (not symlinks to them).
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    /// Returns `true` if the name starts with [`HIDDEN_MARKER`].
    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }
}
