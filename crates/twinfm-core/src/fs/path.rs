//! Path helpers shared by the navigator, the engine and the lock table.

use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute (relative to `base`) and removes `.`/`..`
/// components lexically. Symlinks are not resolved.
pub fn normalize_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Normalises `path` against the process working directory.
pub fn absolute(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    normalize_path(&cwd, path)
}

/// Resolves symlinks and `..` in the parents of `path`. The final
/// component is kept as is, so a symlink still names the link itself.
/// Parents that do not exist yet are normalised lexically.
pub fn resolve_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => canonicalize_existing(parent).join(name),
        _ => canonicalize_existing(&joined),
    }
}

/// Canonicalises the longest existing ancestor of `path` and appends the
/// rest lexically.
fn canonicalize_existing(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(real) = std::fs::canonicalize(ancestor) {
            let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return normalize_path(&real, rest);
        }
    }
    normalize_path(Path::new("/"), path)
}

/// Returns `true` if `a` and `b` are the same path or one contains the other.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// A valid name is a single, non-empty path component.
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\0') {
        return false;
    }
    #[cfg(windows)]
    if name.contains('\\') || name.contains(':') {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_removes_dots() {
        let base = Path::new("/home/user");
        assert_eq!(
            normalize_path(base, Path::new("docs/./a/../b")),
            PathBuf::from("/home/user/docs/b")
        );
        assert_eq!(normalize_path(base, Path::new("/etc/../var")), PathBuf::from("/var"));
    }

    #[test]
    fn normalize_never_climbs_above_root() {
        assert_eq!(
            normalize_path(Path::new("/"), Path::new("../../x")),
            PathBuf::from("/x")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_symlinked_and_dotdot_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let real = std::fs::canonicalize(tmp.path()).unwrap();
        std::fs::create_dir(tmp.path().join("other")).unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("alias")).unwrap();

        assert_eq!(resolve_path(&tmp.path().join("alias/docs")), real.join("docs"));
        assert_eq!(resolve_path(&tmp.path().join("other/../docs")), real.join("docs"));
        assert_eq!(resolve_path(&tmp.path().join("alias")), real.join("alias"));
        assert_eq!(
            resolve_path(&tmp.path().join("missing/deeper/../x")),
            real.join("missing/x")
        );
    }

    #[test]
    fn overlap_is_component_wise() {
        assert!(paths_overlap(Path::new("/a"), Path::new("/a/b")));
        assert!(paths_overlap(Path::new("/a/b"), Path::new("/a")));
        assert!(paths_overlap(Path::new("/a"), Path::new("/a")));
        assert!(!paths_overlap(Path::new("/a"), Path::new("/ab")));
        assert!(!paths_overlap(Path::new("/a/b"), Path::new("/a/c")));
    }

    #[test]
    fn filename_validation() {
        assert!(is_valid_filename("report.pdf"));
        assert!(is_valid_filename("파일.txt"));
        assert!(is_valid_filename(".hidden"));
        assert!(!is_valid_filename(""));
        assert!(!is_valid_filename("."));
        assert!(!is_valid_filename(".."));
        assert!(!is_valid_filename("bad/name"));
        assert!(!is_valid_filename("bad\0name"));
    }
}
