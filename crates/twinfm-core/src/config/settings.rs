//! Engine configuration loaded from a TOML file.
//!
//! Every field has a default, so the engine works without a config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::fs::ops::DEFAULT_CHUNK_SIZE;

/// Top-level configuration.
///
/// Call [`Config::load`] to read from a TOML path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub operations: OperationsConfig,
    #[serde(default)]
    pub trash: TrashConfig,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Default config file location: `$XDG_CONFIG_HOME/twinfm/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("twinfm").join("config.toml"))
    }
}

/// Browsing preferences shared by both panes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub show_hidden: bool,
    /// Target of `home()`. Defaults to the user's home directory.
    #[serde(default)]
    pub home: Option<PathBuf>,
}

impl GeneralConfig {
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone().or_else(dirs::home_dir)
    }
}

/// File operation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationsConfig {
    /// Bytes per read/write step; cancellation is checked between steps.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Compare SHA-256 digests (not just sizes) before a cross-device
    /// move deletes its source.
    #[serde(default)]
    pub verify_checksum: bool,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            verify_checksum: false,
        }
    }
}

/// Trash settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    /// When `false`, every delete needs the permanent-delete override.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Home trash directory. Defaults to `$XDG_DATA_HOME/Trash`.
    #[serde(default)]
    pub home_trash: Option<PathBuf>,
    /// Use `$topdir/.Trash-$uid` for paths on other filesystems.
    #[serde(default = "default_true")]
    pub use_volume_trash: bool,
}

impl TrashConfig {
    pub fn home_trash_dir(&self) -> Option<PathBuf> {
        self.home_trash
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("Trash")))
    }
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            home_trash: None,
            use_volume_trash: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();

        assert!(!config.general.show_hidden);
        assert!(config.general.home.is_none());
        assert_eq!(config.operations.chunk_size, 1024 * 1024);
        assert!(!config.operations.verify_checksum);
        assert!(config.trash.enabled);
        assert!(config.trash.use_volume_trash);
    }

    #[test]
    fn load_full_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[general]
show_hidden = true
home = "/srv/files"

[operations]
chunk_size = 4096
verify_checksum = true

[trash]
enabled = false
home_trash = "/tmp/trash"
use_volume_trash = false
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert!(config.general.show_hidden);
        assert_eq!(config.general.home_dir(), Some(PathBuf::from("/srv/files")));
        assert_eq!(config.operations.chunk_size, 4096);
        assert!(config.operations.verify_checksum);
        assert!(!config.trash.enabled);
        assert_eq!(config.trash.home_trash_dir(), Some(PathBuf::from("/tmp/trash")));
        assert!(!config.trash.use_volume_trash);
    }

    #[test]
    fn load_partial_toml_uses_defaults() {
        let config = Config::parse("[general]\nshow_hidden = true\n").unwrap();

        assert!(config.general.show_hidden);
        assert_eq!(config.operations.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.trash.enabled);
    }

    #[test]
    fn load_empty_toml_uses_all_defaults() {
        let config = Config::parse("").unwrap();
        assert!(!config.general.show_hidden);
        assert!(config.trash.enabled);
    }

    #[test]
    fn load_nonexistent_returns_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join("nonexistent.toml"));
        assert!(matches!(result.unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn load_invalid_toml_returns_config_parse() {
        let result = Config::parse("this is not valid [[[toml");
        assert!(matches!(result.unwrap_err(), CoreError::ConfigParse(_)));
    }

    #[test]
    fn default_path_ends_with_config_toml() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("twinfm/config.toml"));
        }
    }
}
