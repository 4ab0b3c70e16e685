//! Filesystem primitives used by the operation engine.
//!
//! Copies are never written to their final name directly: the data goes
//! to a hidden temporary sibling which is renamed into place only after
//! it is complete. A failed or cancelled copy removes the temporary, so
//! the destination is either complete or absent.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::{is_cross_device, CoreError, CoreResult};
use crate::fs::path::{is_valid_filename, resolve_path};

/// Default read/write chunk size for byte copies (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum recursion depth for tree copies to guard against pathological trees.
const MAX_COPY_DEPTH: usize = 64;

/// Marker inserted into temporary copy names.
const PART_MARKER: &str = "twinfm-part";

/// Cancellation and progress plumbing for a byte copy.
pub struct Transfer<'a> {
    cancel: &'a CancellationToken,
    chunk_size: usize,
    on_progress: &'a mut dyn FnMut(u64),
}

impl<'a> Transfer<'a> {
    pub fn new(
        cancel: &'a CancellationToken,
        chunk_size: usize,
        on_progress: &'a mut dyn FnMut(u64),
    ) -> Self {
        Self {
            cancel,
            chunk_size: chunk_size.max(1),
            on_progress,
        }
    }

    fn check(&self) -> CoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }
}

/// Size summary of a file or directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSize {
    pub bytes: u64,
    pub files: u64,
}

/// Copies `src` (file, symlink or directory) to `dest`.
///
/// The copy is built under a temporary sibling of `dest` and renamed into
/// place when complete. With `replace` an existing `dest` is replaced;
/// otherwise an existing `dest` yields [`CoreError::AlreadyExists`].
///
/// Returns the number of file bytes copied.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if `src` does not exist.
/// - [`CoreError::RecursiveCopy`] if `dest` lies inside `src`.
/// - [`CoreError::SpecialFile`] if the tree holds a FIFO, socket or device.
/// - [`CoreError::Cancelled`] if the transfer was cancelled; nothing is left behind.
pub fn copy_atomic(
    src: &Path,
    dest: &Path,
    replace: bool,
    transfer: &mut Transfer<'_>,
) -> CoreResult<u64> {
    copy_staged(src, dest, replace, transfer, |_| Ok(()))
}

/// Like [`copy_atomic`], but the finished temporary is checked against
/// `src` with [`verify_copy`] before it is renamed into place. A mismatch
/// removes the temporary and leaves any existing `dest` untouched.
pub fn copy_verified(
    src: &Path,
    dest: &Path,
    replace: bool,
    checksum: bool,
    transfer: &mut Transfer<'_>,
) -> CoreResult<u64> {
    copy_staged(src, dest, replace, transfer, |temp| verify_copy(src, temp, checksum))
}

fn copy_staged(
    src: &Path,
    dest: &Path,
    replace: bool,
    transfer: &mut Transfer<'_>,
    check: impl FnOnce(&Path) -> CoreResult<()>,
) -> CoreResult<u64> {
    let meta = fs::symlink_metadata(src).map_err(|e| CoreError::from_io(e, src))?;
    if meta.is_dir() && resolve_path(dest).starts_with(resolve_path(src)) {
        return Err(CoreError::RecursiveCopy(src.to_path_buf()));
    }
    if !replace && exists(dest) {
        return Err(CoreError::AlreadyExists(dest.to_path_buf()));
    }

    let temp = temp_sibling(dest);
    let result = copy_any(src, &temp, &meta, transfer, 0).and_then(|bytes| {
        check(&temp)?;
        install(&temp, dest, replace)?;
        Ok(bytes)
    });

    if result.is_err() && exists(&temp) {
        if let Err(e) = remove_path(&temp) {
            tracing::warn!("failed to clean up partial copy {}: {e}", temp.display());
        }
    }
    result
}

fn copy_any(
    src: &Path,
    dest: &Path,
    meta: &fs::Metadata,
    transfer: &mut Transfer<'_>,
    depth: usize,
) -> CoreResult<u64> {
    let ft = meta.file_type();
    if ft.is_symlink() {
        copy_symlink(src, dest)?;
        Ok(0)
    } else if ft.is_dir() {
        copy_tree(src, dest, meta, transfer, depth)
    } else if ft.is_file() {
        copy_file_chunked(src, dest, meta, transfer)
    } else {
        // Opening a FIFO for reading blocks until a writer shows up.
        Err(CoreError::SpecialFile(src.to_path_buf()))
    }
}

fn copy_symlink(src: &Path, dest: &Path) -> CoreResult<()> {
    let target = fs::read_link(src).map_err(|e| CoreError::from_io(e, src))?;
    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, dest).map_err(|e| CoreError::from_io(e, dest))?;
    #[cfg(not(unix))]
    {
        let _ = target;
        fs::copy(src, dest).map_err(|e| CoreError::from_io(e, dest))?;
    }
    Ok(())
}

/// Copies one regular file in chunks, checking for cancellation between
/// chunks, then carries over permission bits and modification time.
fn copy_file_chunked(
    src: &Path,
    dest: &Path,
    meta: &fs::Metadata,
    transfer: &mut Transfer<'_>,
) -> CoreResult<u64> {
    transfer.check()?;
    let mut reader = File::open(src).map_err(|e| CoreError::from_io(e, src))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| CoreError::from_io(e, dest))?;

    let mut buf = vec![0u8; transfer.chunk_size];
    let mut copied = 0u64;
    loop {
        transfer.check()?;
        let n = reader.read(&mut buf).map_err(|e| CoreError::from_io(e, src))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .map_err(|e| CoreError::from_io(e, dest))?;
        copied += n as u64;
        (transfer.on_progress)(n as u64);
    }
    writer.sync_all().map_err(|e| CoreError::from_io(e, dest))?;

    if let Ok(modified) = meta.modified() {
        writer
            .set_modified(modified)
            .map_err(|e| CoreError::from_io(e, dest))?;
    }
    drop(writer);
    fs::set_permissions(dest, meta.permissions()).map_err(|e| CoreError::from_io(e, dest))?;

    if copied != meta.len() {
        return Err(CoreError::VerificationFailed(dest.to_path_buf()));
    }
    Ok(copied)
}

/// Depth-first tree copy: each directory is created before its children.
fn copy_tree(
    src: &Path,
    dest: &Path,
    meta: &fs::Metadata,
    transfer: &mut Transfer<'_>,
    depth: usize,
) -> CoreResult<u64> {
    if depth > MAX_COPY_DEPTH {
        return Err(CoreError::Io(std::io::Error::other(format!(
            "maximum recursion depth ({MAX_COPY_DEPTH}) exceeded during copy"
        ))));
    }
    transfer.check()?;
    fs::create_dir(dest).map_err(|e| CoreError::from_io(e, dest))?;

    let mut children: Vec<_> = fs::read_dir(src)
        .map_err(|e| CoreError::from_io(e, src))?
        .collect::<Result<_, _>>()
        .map_err(|e| CoreError::from_io(e, src))?;
    children.sort_by_key(|c| c.file_name());

    let mut total = 0u64;
    for child in children {
        let child_src = child.path();
        let child_meta =
            fs::symlink_metadata(&child_src).map_err(|e| CoreError::from_io(e, &child_src))?;
        total += copy_any(
            &child_src,
            &dest.join(child.file_name()),
            &child_meta,
            transfer,
            depth + 1,
        )?;
    }

    // Children are in place: now the directory's own attributes can stick.
    fs::set_permissions(dest, meta.permissions()).map_err(|e| CoreError::from_io(e, dest))?;
    if let (Ok(modified), Ok(dir)) = (meta.modified(), File::open(dest)) {
        if let Err(e) = dir.set_modified(modified) {
            tracing::debug!("could not set mtime on {}: {e}", dest.display());
        }
    }
    Ok(total)
}

/// Renames a finished temporary into its final place.
fn install(temp: &Path, dest: &Path, replace: bool) -> CoreResult<()> {
    if !replace && exists(dest) {
        return Err(CoreError::AlreadyExists(dest.to_path_buf()));
    }
    replace_path(temp, dest)
}

/// Renames `from` onto `to`, replacing whatever is there.
///
/// `rename(2)` swaps a non-directory for a non-directory atomically. Any
/// other existing `to` is first renamed to a temporary sibling, which is
/// removed once `from` is in place and renamed back if the rename fails.
/// On error both paths are as they were.
pub fn replace_path(from: &Path, to: &Path) -> CoreResult<()> {
    let Ok(existing) = fs::symlink_metadata(to) else {
        return rename_path(from, to);
    };
    let from_is_dir = fs::symlink_metadata(from)
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !existing.is_dir() && !from_is_dir {
        return rename_path(from, to);
    }

    let aside = temp_sibling(to);
    fs::rename(to, &aside).map_err(|e| CoreError::from_io(e, to))?;
    match rename_path(from, to) {
        Ok(()) => {
            if let Err(e) = remove_path(&aside) {
                tracing::warn!("failed to remove replaced {}: {e}", aside.display());
            }
            Ok(())
        }
        Err(e) => {
            if let Err(restore) = fs::rename(&aside, to) {
                tracing::error!(
                    "could not restore {} from {}: {restore}",
                    to.display(),
                    aside.display()
                );
            }
            Err(e)
        }
    }
}

/// Renames `from` to `to`.
///
/// An `EXDEV` failure is reported as [`CoreError::CrossDeviceMove`] so the
/// caller can fall back to copy-then-delete.
pub fn rename_path(from: &Path, to: &Path) -> CoreResult<()> {
    fs::rename(from, to).map_err(|e| {
        if is_cross_device(&e) {
            CoreError::CrossDeviceMove {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            }
        } else {
            CoreError::from_io(e, from)
        }
    })
}

/// Deletes a file, symlink or directory (recursively). Symlinks are never
/// followed.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if `path` does not exist.
/// - [`CoreError::Io`] for any I/O failure during deletion.
pub fn remove_path(path: &Path) -> CoreResult<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| CoreError::from_io(e, path))
    } else {
        fs::remove_file(path).map_err(|e| CoreError::from_io(e, path))
    }
}

/// Returns `true` if something (even a dangling symlink) exists at `path`.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Totals the file bytes and file count below `path`.
pub fn tree_size(path: &Path) -> CoreResult<TreeSize> {
    let meta = fs::symlink_metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    if !meta.is_dir() {
        return Ok(TreeSize {
            bytes: if meta.is_file() { meta.len() } else { 0 },
            files: 1,
        });
    }
    let mut total = TreeSize::default();
    for child in fs::read_dir(path).map_err(|e| CoreError::from_io(e, path))? {
        let child = child.map_err(|e| CoreError::from_io(e, path))?;
        let sub = tree_size(&child.path())?;
        total.bytes += sub.bytes;
        total.files += sub.files;
    }
    Ok(total)
}

/// Computes the SHA-256 digest of a file as a hex string, streaming it.
pub fn file_digest(path: &Path) -> CoreResult<String> {
    let mut file = File::open(path).map_err(|e| CoreError::from_io(e, path))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| CoreError::from_io(e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks that `copy` matches `original`: sizes always, and per-file
/// SHA-256 digests when `checksum` is set.
pub fn verify_copy(original: &Path, copy: &Path, checksum: bool) -> CoreResult<()> {
    let mismatch = || CoreError::VerificationFailed(copy.to_path_buf());
    if tree_size(original)? != tree_size(copy)? {
        return Err(mismatch());
    }
    if !checksum {
        return Ok(());
    }
    let meta = fs::symlink_metadata(original).map_err(|e| CoreError::from_io(e, original))?;
    if meta.is_file() {
        if file_digest(original)? != file_digest(copy)? {
            return Err(mismatch());
        }
    } else if meta.is_dir() {
        for child in fs::read_dir(original).map_err(|e| CoreError::from_io(e, original))? {
            let child = child.map_err(|e| CoreError::from_io(e, original))?;
            verify_copy(&child.path(), &copy.join(child.file_name()), checksum)?;
        }
    }
    Ok(())
}

/// Returns the device id of the filesystem holding `path`.
#[cfg(unix)]
pub fn device_id(path: &Path) -> CoreResult<u64> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::symlink_metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    Ok(meta.dev())
}

#[cfg(not(unix))]
pub fn device_id(path: &Path) -> CoreResult<u64> {
    fs::symlink_metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    Ok(0)
}

/// Returns `true` if `a` and `b` name the same directory entry once
/// symlinked and `..` parents are resolved, or are links to one inode.
pub fn same_entry(a: &Path, b: &Path) -> bool {
    resolve_path(a) == resolve_path(b) || same_inode(a, b)
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

/// Finds a free sibling name by appending ` (1)`, ` (2)`, ... to the stem.
pub fn unique_name(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|s| s.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem} ({counter}).{ext}"),
            None => format!("{stem} ({counter})"),
        };
        let candidate = parent.join(name);
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Hidden, unique sibling of `dest` used while a copy is in flight.
pub fn temp_sibling(dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap_or(Path::new(""));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag = uuid::Uuid::new_v4().simple().to_string();
    parent.join(format!(".{name}.{PART_MARKER}-{}", &tag[..12]))
}

/// Creates a new, empty directory `name` inside `parent`.
pub fn create_directory(parent: &Path, name: &str) -> CoreResult<PathBuf> {
    let target = child_path(parent, name)?;
    fs::create_dir(&target).map_err(|e| CoreError::from_io(e, &target))?;
    Ok(target)
}

/// Creates a new, empty file `name` inside `parent`.
pub fn create_file(parent: &Path, name: &str) -> CoreResult<PathBuf> {
    let target = child_path(parent, name)?;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(|e| CoreError::from_io(e, &target))?;
    Ok(target)
}

fn child_path(parent: &Path, name: &str) -> CoreResult<PathBuf> {
    if !is_valid_filename(name) {
        return Err(CoreError::InvalidName(name.to_string()));
    }
    let meta = fs::metadata(parent).map_err(|e| CoreError::from_io(e, parent))?;
    if !meta.is_dir() {
        return Err(CoreError::NotADirectory(parent.to_path_buf()));
    }
    Ok(parent.join(name))
}
