//! Directory listing.
//!
//! [`list_directory`] is the single entry point both panes use. Its output
//! order (directories first, then case-insensitive by name) is a contract:
//! two listings of an unchanged directory are always identical.

use std::cmp::Ordering;
use std::path::Path;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::{CoreError, CoreResult};
use crate::fs::entry::Entry;

/// Options accepted by [`list_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub show_hidden: bool,
    pub dirs_first: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            dirs_first: true,
        }
    }
}

/// Lists the direct children of `path`.
///
/// Hidden entries are dropped unless `show_hidden` is set. The result is
/// sorted directories-first, then by case-insensitive name.
///
/// # Errors
///
/// - [`CoreError::NotFound`] — the path does not exist.
/// - [`CoreError::NotADirectory`] — the path is not a directory.
/// - [`CoreError::PermissionDenied`] — read access is denied.
/// - [`CoreError::Io`] — any other I/O error.
///
/// # Examples
///
/// ```no_run
/// use twinfm_core::list_directory;
/// use std::path::Path;
///
/// let entries = list_directory(Path::new("/home/user"), false).unwrap();
/// for entry in &entries {
///     println!("{}", entry.name());
/// }
/// ```
pub fn list_directory(path: &Path, show_hidden: bool) -> CoreResult<Vec<Entry>> {
    list_with_options(
        path,
        ListOptions {
            show_hidden,
            dirs_first: true,
        },
    )
}

/// Like [`list_directory`] but with every knob exposed.
pub fn list_with_options(path: &Path, options: ListOptions) -> CoreResult<Vec<Entry>> {
    let mut entries = Vec::new();
    read_entries(path, options.show_hidden, |entry| entries.push(entry))?;
    sort_entries(&mut entries, options.dirs_first);
    Ok(entries)
}

/// Lists `path`, sending each entry over `tx` as soon as it is read.
///
/// Streamed entries arrive in storage order. The returned vector is the
/// complete, validated listing in contract order. A dropped receiver does
/// not abort the listing.
pub fn stream_directory(
    path: &Path,
    show_hidden: bool,
    tx: &UnboundedSender<Entry>,
) -> CoreResult<Vec<Entry>> {
    let mut entries = Vec::new();
    read_entries(path, show_hidden, |entry| {
        let _ = tx.send(entry.clone());
        entries.push(entry);
    })?;
    sort_entries(&mut entries, true);
    Ok(entries)
}

/// Sorts entries in place: optionally directories first, then
/// case-insensitive name, with the exact name as a tie-breaker so the
/// order is total.
pub fn sort_entries(entries: &mut [Entry], dirs_first: bool) {
    entries.sort_by(|a, b| compare_entries(a, b, dirs_first));
}

/// Returns only the entries that are not hidden.
pub fn filter_hidden(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().filter(|e| !e.is_hidden()).cloned().collect()
}

fn compare_entries(a: &Entry, b: &Entry, dirs_first: bool) -> Ordering {
    if dirs_first {
        let dir_cmp = b.is_dir().cmp(&a.is_dir());
        if dir_cmp != Ordering::Equal {
            return dir_cmp;
        }
    }
    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
}

fn read_entries(path: &Path, show_hidden: bool, mut sink: impl FnMut(Entry)) -> CoreResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    if !meta.is_dir() {
        return Err(CoreError::NotADirectory(path.to_path_buf()));
    }

    let read_dir = std::fs::read_dir(path).map_err(|e| CoreError::from_io(e, path))?;

    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("skipping unreadable entry in {}: {e}", path.display());
                continue;
            }
        };
        let entry_path = dir_entry.path();
        // Vanished between readdir and stat: not part of this snapshot.
        let metadata = match std::fs::symlink_metadata(&entry_path) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!("skipping {}: {e}", entry_path.display());
                continue;
            }
        };
        let entry = Entry::new(entry_path, &metadata);
        if !show_hidden && entry.is_hidden() {
            continue;
        }
        sink(entry);
    }

    Ok(())
}
