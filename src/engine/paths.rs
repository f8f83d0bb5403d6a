//! Virtual path handling
//!
//! Every account sees its home directory as `/`. Client paths are normalised
//! as virtual paths first, so `..` can never climb above the home directory,
//! and only then mapped onto the real filesystem.

use std::path::{Path, PathBuf};

/// Resolves `target` against the virtual directory `cwd`.
///
/// `..` at the virtual root stays at the root.
pub fn resolve_virtual(cwd: &str, target: &str) -> String {
    let mut components: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        cwd.split('/').filter(|c| !c.is_empty()).collect()
    };

    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }

    format!("/{}", components.join("/"))
}

/// Maps a normalised virtual path onto the account's home directory.
pub fn virtual_to_real(home: &Path, virtual_path: &str) -> PathBuf {
    let relative = virtual_path.trim_start_matches('/');
    if relative.is_empty() {
        home.to_path_buf()
    } else {
        home.join(relative)
    }
}

/// Returns whether `real` still lies inside `home` once symlinks are
/// resolved. Paths that do not exist are judged by their parent directory.
pub async fn is_within(home: &Path, real: &Path) -> bool {
    let home = match tokio::fs::canonicalize(home).await {
        Ok(home) => home,
        Err(_) => return false,
    };
    if let Ok(resolved) = tokio::fs::canonicalize(real).await {
        return resolved.starts_with(&home);
    }
    match real.parent() {
        Some(parent) => match tokio::fs::canonicalize(parent).await {
            Ok(resolved) => resolved.starts_with(&home),
            Err(_) => false,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_targets() {
        assert_eq!(resolve_virtual("/", "docs"), "/docs");
        assert_eq!(resolve_virtual("/docs", "reports/q1"), "/docs/reports/q1");
        assert_eq!(resolve_virtual("/docs", "/pub"), "/pub");
        assert_eq!(resolve_virtual("/docs", "./a//b/"), "/docs/a/b");
    }

    #[test]
    fn parent_components_stop_at_the_root() {
        assert_eq!(resolve_virtual("/docs", ".."), "/");
        assert_eq!(resolve_virtual("/", "../../etc/passwd"), "/etc/passwd");
        assert_eq!(resolve_virtual("/a/b", "../../.."), "/");
    }

    #[test]
    fn maps_into_the_home_directory() {
        let home = Path::new("/srv/alice");
        assert_eq!(virtual_to_real(home, "/"), PathBuf::from("/srv/alice"));
        assert_eq!(
            virtual_to_real(home, "/docs/a.txt"),
            PathBuf::from("/srv/alice/docs/a.txt")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_out_of_home_are_detected() {
        let home = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join("inner")).unwrap();
        std::os::unix::fs::symlink(outside.path(), home.path().join("escape")).unwrap();

        assert!(is_within(home.path(), &home.path().join("inner")).await);
        assert!(is_within(home.path(), &home.path().join("new.txt")).await);
        assert!(!is_within(home.path(), &home.path().join("escape")).await);
        assert!(!is_within(home.path(), &home.path().join("escape/new.txt")).await);
    }
}
