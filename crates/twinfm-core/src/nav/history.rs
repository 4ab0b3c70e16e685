//! Navigation history with back/forward support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Immutable navigation history with back/forward stacks.
///
/// Every mutation returns a **new** `History` instance. The location being
/// displayed is not stored here; callers pass it in so it can be pushed
/// onto the opposite stack (same semantics as a web browser).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    back_stack: Vec<PathBuf>,
    forward_stack: Vec<PathBuf>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `current` is being left by a direct navigation:
    /// pushes it onto the back stack and clears the forward stack.
    pub fn push(&self, current: PathBuf) -> Self {
        let mut back_stack = self.back_stack.clone();
        back_stack.push(current);
        Self {
            back_stack,
            forward_stack: Vec::new(),
        }
    }

    /// Returns a copy with the forward stack cleared.
    pub fn clear_forward(&self) -> Self {
        Self {
            back_stack: self.back_stack.clone(),
            forward_stack: Vec::new(),
        }
    }

    /// Go back one step from `current`. Returns the new History and the
    /// path to navigate to, or `None` if the back stack is empty.
    pub fn go_back(&self, current: &Path) -> Option<(Self, PathBuf)> {
        let mut back_stack = self.back_stack.clone();
        let path = back_stack.pop()?;
        let mut forward_stack = self.forward_stack.clone();
        forward_stack.push(current.to_path_buf());
        Some((
            Self {
                back_stack,
                forward_stack,
            },
            path,
        ))
    }

    /// Go forward one step from `current`. Returns the new History and the
    /// path to navigate to, or `None` if the forward stack is empty.
    pub fn go_forward(&self, current: &Path) -> Option<(Self, PathBuf)> {
        let mut forward_stack = self.forward_stack.clone();
        let path = forward_stack.pop()?;
        let mut back_stack = self.back_stack.clone();
        back_stack.push(current.to_path_buf());
        Some((
            Self {
                back_stack,
                forward_stack,
            },
            path,
        ))
    }

    /// Returns `true` if there is at least one entry on the back stack.
    pub fn can_go_back(&self) -> bool {
        !self.back_stack.is_empty()
    }

    /// Returns `true` if there is at least one entry on the forward stack.
    pub fn can_go_forward(&self) -> bool {
        !self.forward_stack.is_empty()
    }

    /// Back stack, oldest first.
    pub fn back_stack(&self) -> &[PathBuf] {
        &self.back_stack
    }

    /// Forward stack, furthest first.
    pub fn forward_stack(&self) -> &[PathBuf] {
        &self.forward_stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_history_is_empty() {
        let history = History::new();
        assert!(!history.can_go_back());
        assert!(!history.can_go_forward());
    }

    #[test]
    fn push_does_not_mutate_original() {
        let history = History::new();
        let _new_history = history.push(PathBuf::from("/home"));

        assert!(!history.can_go_back());
    }

    #[test]
    fn go_back_moves_current_to_forward() {
        let history = History::new().push(PathBuf::from("/a"));

        let (history, target) = history.go_back(Path::new("/b")).unwrap();

        assert_eq!(target, PathBuf::from("/a"));
        assert!(!history.can_go_back());
        assert_eq!(history.forward_stack(), &[PathBuf::from("/b")]);
    }

    #[test]
    fn go_back_and_forward_on_empty_return_none() {
        let history = History::new();
        assert!(history.go_back(Path::new("/x")).is_none());
        assert!(history.go_forward(Path::new("/x")).is_none());
    }

    #[test]
    fn back_and_forward_round_trip() {
        // visited /a, /b, now at /c
        let history = History::new()
            .push(PathBuf::from("/a"))
            .push(PathBuf::from("/b"));

        let (history, at) = history.go_back(Path::new("/c")).unwrap();
        assert_eq!(at, PathBuf::from("/b"));
        let (history, at) = history.go_back(&at).unwrap();
        assert_eq!(at, PathBuf::from("/a"));

        let (history, at) = history.go_forward(&at).unwrap();
        assert_eq!(at, PathBuf::from("/b"));
        let (history, at) = history.go_forward(&at).unwrap();
        assert_eq!(at, PathBuf::from("/c"));

        assert!(!history.can_go_forward());
        assert_eq!(
            history.back_stack(),
            &[PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn push_clears_forward_stack() {
        let history = History::new().push(PathBuf::from("/a"));
        let (history, _) = history.go_back(Path::new("/b")).unwrap();
        assert!(history.can_go_forward());

        let history = history.push(PathBuf::from("/a"));

        assert!(!history.can_go_forward());
        assert!(history.can_go_back());
    }

    #[test]
    fn clear_forward_keeps_back() {
        let history = History::new().push(PathBuf::from("/a")).push(PathBuf::from("/b"));
        let (history, _) = history.go_back(Path::new("/c")).unwrap();

        let cleared = history.clear_forward();

        assert!(!cleared.can_go_forward());
        assert_eq!(cleared.back_stack(), history.back_stack());
    }
}
