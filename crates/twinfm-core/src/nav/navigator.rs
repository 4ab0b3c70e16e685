//! Per-pane location state machine.
//!
//! [`PathNavigator`] owns the directory a pane is showing plus its
//! [`History`]. Every transition validates the target first and returns
//! a new navigator, so a failed transition can never leave a pane
//! pointing at a directory it could not open.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::fs::path::normalize_path;
use crate::nav::history::History;

/// Current location plus back/forward history for one pane.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use twinfm_core::PathNavigator;
///
/// let nav = PathNavigator::new(Path::new("/home/user")).unwrap();
/// let nav = nav.navigate(Path::new("Documents")).unwrap();
/// let nav = nav.back().unwrap();
/// assert_eq!(nav.current(), Path::new("/home/user"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNavigator {
    current: PathBuf,
    history: History,
    home: Option<PathBuf>,
}

impl PathNavigator {
    /// Creates a navigator positioned at `start` with empty history.
    ///
    /// # Errors
    ///
    /// Same as [`PathNavigator::navigate`].
    pub fn new(start: &Path) -> CoreResult<Self> {
        let current = normalize_path(&std::env::current_dir()?, start);
        validate_directory(&current)?;
        Ok(Self {
            current,
            history: History::new(),
            home: None,
        })
    }

    /// Returns a copy whose [`home`](Self::home) target is `home` instead
    /// of the user's home directory.
    pub fn with_home(self, home: Option<PathBuf>) -> Self {
        Self { home, ..self }
    }

    /// Moves to `path`, resolved against the current directory when relative.
    ///
    /// The old location goes onto the back stack and the forward stack is
    /// cleared. Navigating to the current directory leaves the back stack
    /// alone but still clears forward.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `path` does not exist.
    /// - [`CoreError::NotADirectory`] if `path` is not a directory.
    /// - [`CoreError::PermissionDenied`] if `path` cannot be listed.
    pub fn navigate(&self, path: &Path) -> CoreResult<Self> {
        let target = normalize_path(&self.current, path);
        validate_directory(&target)?;

        if target == self.current {
            return Ok(Self {
                history: self.history.clear_forward(),
                ..self.clone()
            });
        }
        Ok(Self {
            current: target,
            history: self.history.push(self.current.clone()),
            home: self.home.clone(),
        })
    }

    /// Returns to the previous location.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoHistory`] if the back stack is empty, or the
    /// validation error if the previous location is gone.
    pub fn back(&self) -> CoreResult<Self> {
        let (history, target) = self
            .history
            .go_back(&self.current)
            .ok_or(CoreError::NoHistory)?;
        validate_directory(&target)?;
        Ok(Self {
            current: target,
            history,
            home: self.home.clone(),
        })
    }

    /// Re-visits the location most recently left with [`back`](Self::back).
    ///
    /// # Errors
    ///
    /// [`CoreError::NoHistory`] if the forward stack is empty, or the
    /// validation error if that location is gone.
    pub fn forward(&self) -> CoreResult<Self> {
        let (history, target) = self
            .history
            .go_forward(&self.current)
            .ok_or(CoreError::NoHistory)?;
        validate_directory(&target)?;
        Ok(Self {
            current: target,
            history,
            home: self.home.clone(),
        })
    }

    /// Navigates to the parent directory.
    ///
    /// # Errors
    ///
    /// [`CoreError::AtRoot`] when already at the filesystem root.
    pub fn up(&self) -> CoreResult<Self> {
        let parent = self.current.parent().ok_or(CoreError::AtRoot)?;
        self.navigate(parent)
    }

    /// Navigates to the configured home directory, falling back to the
    /// user's home directory.
    pub fn home(&self) -> CoreResult<Self> {
        let home = self
            .home
            .clone()
            .or_else(dirs::home_dir)
            .ok_or_else(|| CoreError::NotFound(PathBuf::from("~")))?;
        self.navigate(&home)
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn back_stack(&self) -> &[PathBuf] {
        self.history.back_stack()
    }

    pub fn forward_stack(&self) -> &[PathBuf] {
        self.history.forward_stack()
    }
}

/// Checks that `path` is an existing directory this process can list.
fn validate_directory(path: &Path) -> CoreResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| CoreError::from_io(e, path))?;
    if !meta.is_dir() {
        return Err(CoreError::NotADirectory(path.to_path_buf()));
    }
    std::fs::read_dir(path).map_err(|e| CoreError::from_io(e, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir(root.join("c")).unwrap();
        fs::write(root.join("file.txt"), "x").unwrap();
        (tmp, root)
    }

    #[test]
    fn new_starts_with_empty_history() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root).unwrap();

        assert_eq!(nav.current(), root.as_path());
        assert!(!nav.can_go_back());
        assert!(!nav.can_go_forward());
    }

    #[test]
    fn new_rejects_missing_directory() {
        let (_tmp, root) = setup();
        let err = PathNavigator::new(&root.join("missing")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn navigate_pushes_previous_location() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root).unwrap();

        let nav = nav.navigate(&root.join("a")).unwrap();

        assert_eq!(nav.current(), root.join("a"));
        assert_eq!(nav.back_stack(), &[root.clone()]);
        assert!(nav.forward_stack().is_empty());
    }

    #[test]
    fn navigate_resolves_relative_paths() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root.join("a")).unwrap();

        let nav = nav.navigate(Path::new("b")).unwrap();
        assert_eq!(nav.current(), root.join("a/b"));

        let nav = nav.navigate(Path::new("../../c")).unwrap();
        assert_eq!(nav.current(), root.join("c"));
    }

    #[test]
    fn navigate_to_file_is_not_a_directory() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root).unwrap();

        let err = nav.navigate(&root.join("file.txt")).unwrap_err();

        assert!(matches!(err, CoreError::NotADirectory(_)));
        assert_eq!(nav.current(), root.as_path());
        assert!(!nav.can_go_back());
    }

    #[test]
    fn navigate_to_missing_is_not_found() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root).unwrap();

        let err = nav.navigate(&root.join("nope")).unwrap_err();

        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn navigate_to_current_clears_forward_only() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root)
            .unwrap()
            .navigate(&root.join("a"))
            .unwrap()
            .back()
            .unwrap();
        assert!(nav.can_go_forward());

        let nav = nav.navigate(&root).unwrap();

        assert_eq!(nav.current(), root.as_path());
        assert!(!nav.can_go_back());
        assert!(!nav.can_go_forward());
    }

    #[test]
    fn back_then_forward_restores_location() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root)
            .unwrap()
            .navigate(&root.join("a"))
            .unwrap()
            .navigate(&root.join("c"))
            .unwrap();

        let nav = nav.back().unwrap();
        assert_eq!(nav.current(), root.join("a"));
        assert_eq!(nav.forward_stack(), &[root.join("c")]);

        let nav = nav.forward().unwrap();
        assert_eq!(nav.current(), root.join("c"));
        assert_eq!(nav.back_stack(), &[root.clone(), root.join("a")]);
        assert!(!nav.can_go_forward());
    }

    #[test]
    fn back_with_empty_history_is_no_history() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root).unwrap();

        assert!(matches!(nav.back().unwrap_err(), CoreError::NoHistory));
        assert!(matches!(nav.forward().unwrap_err(), CoreError::NoHistory));
    }

    #[test]
    fn back_to_vanished_directory_keeps_state() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root.join("c"))
            .unwrap()
            .navigate(&root.join("a"))
            .unwrap();
        fs::remove_dir(root.join("c")).unwrap();

        let err = nav.back().unwrap_err();

        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(nav.current(), root.join("a"));
        assert_eq!(nav.back_stack(), &[root.join("c")]);
    }

    #[test]
    fn new_navigation_discards_forward_history() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root)
            .unwrap()
            .navigate(&root.join("a"))
            .unwrap()
            .back()
            .unwrap();

        let nav = nav.navigate(&root.join("c")).unwrap();

        assert!(!nav.can_go_forward());
        assert_eq!(nav.back_stack(), &[root.clone()]);
    }

    #[test]
    fn up_moves_to_parent() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root.join("a/b")).unwrap();

        let nav = nav.up().unwrap();

        assert_eq!(nav.current(), root.join("a"));
        assert_eq!(nav.back_stack(), &[root.join("a/b")]);
    }

    #[test]
    fn up_at_root_is_at_root() {
        let nav = PathNavigator::new(Path::new("/")).unwrap();
        assert!(matches!(nav.up().unwrap_err(), CoreError::AtRoot));
    }

    #[test]
    fn home_uses_configured_directory() {
        let (_tmp, root) = setup();
        let nav = PathNavigator::new(&root.join("a"))
            .unwrap()
            .with_home(Some(root.join("c")));

        let nav = nav.home().unwrap();

        assert_eq!(nav.current(), root.join("c"));
        assert!(nav.can_go_back());
    }
}
