//! `.trashinfo` restore-metadata records (freedesktop.org trash format).
//!
//! ```text
//! [Trash Info]
//! Path=/home/user/notes%20old.txt
//! DeletionDate=2024-05-01T13:45:10
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{CoreError, CoreResult};

/// File extension of restore-metadata records.
pub const TRASHINFO_EXTENSION: &str = "trashinfo";

/// `DeletionDate` format: local time, second precision, no zone.
pub const DELETION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const HEADER: &str = "[Trash Info]";

/// Parsed contents of one `.trashinfo` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashInfo {
    /// Absolute for the home trash, relative to the volume root for a
    /// per-volume trash.
    pub path: PathBuf,
    pub deleted_at: NaiveDateTime,
}

impl TrashInfo {
    pub fn new(path: PathBuf, deleted_at: NaiveDateTime) -> Self {
        Self { path, deleted_at }
    }

    /// Renders the record in its on-disk text form.
    pub fn render(&self) -> String {
        format!(
            "{HEADER}\nPath={}\nDeletionDate={}\n",
            encode_path(&self.path),
            self.deleted_at.format(DELETION_DATE_FORMAT)
        )
    }

    /// Parses the on-disk text form.
    ///
    /// # Errors
    ///
    /// [`CoreError::TrashInfo`] when the header, `Path` or `DeletionDate`
    /// is missing or malformed.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some(HEADER) {
            return Err(CoreError::TrashInfo("missing [Trash Info] header".to_string()));
        }

        let mut path = None;
        let mut deleted_at = None;
        for line in lines {
            if line.starts_with('[') {
                break;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "Path" if path.is_none() => path = Some(decode_path(value.trim())?),
                "DeletionDate" if deleted_at.is_none() => {
                    deleted_at = Some(
                        NaiveDateTime::parse_from_str(value.trim(), DELETION_DATE_FORMAT)
                            .map_err(|e| CoreError::TrashInfo(format!("bad DeletionDate: {e}")))?,
                    );
                }
                _ => {}
            }
        }

        match (path, deleted_at) {
            (Some(path), Some(deleted_at)) => Ok(Self { path, deleted_at }),
            (None, _) => Err(CoreError::TrashInfo("missing Path".to_string())),
            (_, None) => Err(CoreError::TrashInfo("missing DeletionDate".to_string())),
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/')
}

/// Percent-encodes every byte outside the URI unreserved set (plus `/`).
pub fn encode_path(path: &Path) -> String {
    let bytes = path_bytes(path);
    let mut out = String::with_capacity(bytes.len());
    for b in bytes {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Reverses [`encode_path`].
pub fn decode_path(encoded: &str) -> CoreResult<PathBuf> {
    let raw = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| CoreError::TrashInfo(format!("bad escape in Path: {encoded}")))?;
            bytes.push(hex);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    Ok(PathBuf::from(os_string_from_bytes(bytes)))
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}
