//! Moving paths into the trash.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::settings::TrashConfig;
use crate::error::{CoreError, CoreResult};
use crate::fs::ops::{device_id, remove_path};
use crate::fs::path::absolute;
use crate::trash::info::{TrashInfo, TRASHINFO_EXTENSION};

/// Result of a successful trash move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashRecord {
    /// Absolute path the item had before it was trashed.
    pub original_path: PathBuf,
    /// Where the item body now lives (`<trash>/files/<name>`).
    pub trashed_path: PathBuf,
    /// The `.trashinfo` record written for the item.
    pub info_path: PathBuf,
    pub deleted_at: NaiveDateTime,
}

/// A concrete trash directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TrashLocation {
    root: PathBuf,
    /// Set for a per-volume trash; `Path=` entries are relative to it.
    topdir: Option<PathBuf>,
}

impl TrashLocation {
    fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    fn info_dir(&self) -> PathBuf {
        self.root.join("info")
    }

    fn ensure(&self) -> CoreResult<()> {
        for dir in [self.files_dir(), self.info_dir()] {
            create_private_dir_all(&dir)?;
        }
        Ok(())
    }

    fn info_path_for(&self, name: &str) -> PathBuf {
        self.info_dir().join(format!("{name}.{TRASHINFO_EXTENSION}"))
    }
}

/// Moves paths into the system trash and lists / empties the home trash.
///
/// The home trash (`$XDG_DATA_HOME/Trash`) serves every path on the same
/// filesystem. Paths on other filesystems go to `$topdir/.Trash-$uid` when
/// volume trashes are enabled; otherwise trashing them reports
/// [`CoreError::Unsupported`].
#[derive(Debug, Clone)]
pub struct TrashAdapter {
    home_trash: Option<PathBuf>,
    use_volume_trash: bool,
}

impl TrashAdapter {
    /// Builds an adapter from configuration.
    pub fn new(config: &TrashConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            home_trash: config.home_trash_dir(),
            use_volume_trash: config.use_volume_trash,
        }
    }

    /// An adapter backed by the given home trash directory only.
    pub fn with_home_trash(root: impl Into<PathBuf>) -> Self {
        Self {
            home_trash: Some(root.into()),
            use_volume_trash: false,
        }
    }

    /// An adapter with no trash at all: every `trash` call is `Unsupported`.
    pub fn disabled() -> Self {
        Self {
            home_trash: None,
            use_volume_trash: false,
        }
    }

    pub fn home_trash(&self) -> Option<&Path> {
        self.home_trash.as_deref()
    }

    /// Moves `path` into the trash and writes its restore metadata.
    ///
    /// Either the item ends up in `files/` with a matching `.trashinfo` in
    /// `info/`, or nothing on disk changes.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `path` does not exist.
    /// - [`CoreError::Unsupported`] if no trash serves the path's filesystem.
    /// - [`CoreError::InvalidName`] if `path` is a root or contains the trash.
    /// - [`CoreError::PermissionDenied`] if the item cannot be moved.
    pub fn trash(&self, path: &Path) -> CoreResult<TrashRecord> {
        let original = absolute(path);
        fs::symlink_metadata(&original).map_err(|e| CoreError::from_io(e, &original))?;

        let name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::InvalidName(original.display().to_string()))?;

        let location = self.location_for(&original)?;
        if location.root.starts_with(&original) {
            return Err(CoreError::InvalidName(format!(
                "{} contains the trash directory",
                original.display()
            )));
        }

        let recorded_path = match &location.topdir {
            Some(topdir) => original
                .strip_prefix(topdir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| original.clone()),
            None => original.clone(),
        };
        // DeletionDate has second precision.
        let now = Local::now().naive_local();
        let deleted_at = now.with_nanosecond(0).unwrap_or(now);
        let info = TrashInfo::new(recorded_path, deleted_at);

        let (trashed_name, info_path) = reserve_slot(&location, &name, &info)?;
        let trashed_path = location.files_dir().join(&trashed_name);

        if let Err(e) = fs::rename(&original, &trashed_path) {
            if let Err(cleanup) = fs::remove_file(&info_path) {
                tracing::warn!("failed to remove {}: {cleanup}", info_path.display());
            }
            return Err(CoreError::from_io(e, &original));
        }

        tracing::info!(
            "trashed {} -> {}",
            original.display(),
            trashed_path.display()
        );
        Ok(TrashRecord {
            original_path: original,
            trashed_path,
            info_path,
            deleted_at,
        })
    }

    /// Number of items currently in the home trash.
    pub fn item_count(&self) -> CoreResult<usize> {
        let Some(location) = self.home_location() else {
            return Ok(0);
        };
        match fs::read_dir(location.files_dir()) {
            Ok(rd) => Ok(rd.filter_map(Result::ok).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CoreError::from_io(e, &location.files_dir())),
        }
    }

    /// Reads every restore record of the home trash. Unparseable records
    /// are skipped with a warning.
    pub fn records(&self) -> CoreResult<Vec<TrashRecord>> {
        let Some(location) = self.home_location() else {
            return Ok(Vec::new());
        };
        let info_dir = location.info_dir();
        let read_dir = match fs::read_dir(&info_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::from_io(e, &info_dir)),
        };

        let mut records = Vec::new();
        for entry in read_dir.filter_map(Result::ok) {
            let info_path = entry.path();
            if info_path.extension().and_then(|e| e.to_str()) != Some(TRASHINFO_EXTENSION) {
                continue;
            }
            let parsed = fs::read_to_string(&info_path)
                .map_err(|e| CoreError::from_io(e, &info_path))
                .and_then(|text| TrashInfo::parse(&text));
            match parsed {
                Ok(info) => {
                    let stem = info_path
                        .file_stem()
                        .map(|s| s.to_os_string())
                        .unwrap_or_default();
                    records.push(TrashRecord {
                        original_path: info.path,
                        trashed_path: location.files_dir().join(stem),
                        info_path,
                        deleted_at: info.deleted_at,
                    });
                }
                Err(e) => tracing::warn!("skipping {}: {e}", info_path.display()),
            }
        }
        records.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at));
        Ok(records)
    }

    /// Permanently removes everything in the home trash. Returns the number
    /// of item bodies removed.
    pub fn empty(&self) -> CoreResult<usize> {
        let Some(location) = self.home_location() else {
            return Ok(0);
        };
        let mut removed = 0;
        if let Ok(rd) = fs::read_dir(location.files_dir()) {
            for entry in rd.filter_map(Result::ok) {
                remove_path(&entry.path())?;
                removed += 1;
            }
        }
        if let Ok(rd) = fs::read_dir(location.info_dir()) {
            for entry in rd.filter_map(Result::ok) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(TRASHINFO_EXTENSION) {
                    fs::remove_file(&path).map_err(|e| CoreError::from_io(e, &path))?;
                }
            }
        }
        tracing::info!("emptied trash: {removed} item(s)");
        Ok(removed)
    }

    fn home_location(&self) -> Option<TrashLocation> {
        self.home_trash.as_ref().map(|root| TrashLocation {
            root: root.clone(),
            topdir: None,
        })
    }

    /// Picks the trash directory serving `path`.
    fn location_for(&self, path: &Path) -> CoreResult<TrashLocation> {
        let unsupported = || CoreError::Unsupported(path.to_path_buf());
        let item_dev = device_id(path)?;

        if let Some(home) = self.home_location() {
            match home.ensure() {
                Ok(()) => {
                    if device_id(&home.root)? == item_dev {
                        return Ok(home);
                    }
                }
                Err(e) => tracing::warn!("home trash unavailable at {}: {e}", home.root.display()),
            }
        }

        if !self.use_volume_trash {
            return Err(unsupported());
        }
        let uid = self.current_uid().ok_or_else(unsupported)?;
        let topdir = mount_root(path, item_dev);
        let volume = TrashLocation {
            root: topdir.join(format!(".Trash-{uid}")),
            topdir: Some(topdir),
        };
        match volume.ensure() {
            Ok(()) => Ok(volume),
            Err(e) => {
                tracing::debug!("no volume trash at {}: {e}", volume.root.display());
                Err(unsupported())
            }
        }
    }

    /// The home trash is created by this process, so its owner is us.
    #[cfg(unix)]
    fn current_uid(&self) -> Option<u32> {
        use std::os::unix::fs::MetadataExt;
        let home = self.home_trash.as_ref()?;
        fs::metadata(home).ok().map(|m| m.uid())
    }

    #[cfg(not(unix))]
    fn current_uid(&self) -> Option<u32> {
        None
    }
}

/// Walks up from `path` to the outermost ancestor still on device `dev`.
fn mount_root(path: &Path, dev: u64) -> PathBuf {
    let mut root = path.to_path_buf();
    let mut cursor = path.parent();
    while let Some(parent) = cursor {
        match device_id(parent) {
            Ok(d) if d == dev => root = parent.to_path_buf(),
            _ => break,
        }
        cursor = parent.parent();
    }
    root
}

/// Claims a free `files/` name by creating its `.trashinfo` exclusively.
fn reserve_slot(
    location: &TrashLocation,
    name: &str,
    info: &TrashInfo,
) -> CoreResult<(String, PathBuf)> {
    let (stem, ext) = split_name(name);
    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            name.to_string()
        } else {
            format!("{stem}_{counter}{ext}")
        };
        counter += 1;

        if fs::symlink_metadata(location.files_dir().join(&candidate)).is_ok() {
            continue;
        }
        let info_path = location.info_path_for(&candidate);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&info_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(CoreError::from_io(e, &info_path)),
        };
        if let Err(e) = file.write_all(info.render().as_bytes()).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&info_path);
            return Err(CoreError::from_io(e, &info_path));
        }
        return Ok((candidate, info_path));
    }
}

/// Splits `archive.tar.gz` into (`archive.tar`, `.gz`); dotfiles keep
/// their whole name as the stem.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn create_private_dir_all(dir: &Path) -> CoreResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| CoreError::from_io(e, dir))
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir).map_err(|e| CoreError::from_io(e, dir))
    }
}
