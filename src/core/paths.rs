//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Path of `path` relative to `base`, joined with `/` regardless of platform.
///
/// Returns `None` when `path` does not live under `base`. Reference forms in
/// source text always use forward slashes, so this is the only shape the
/// rewriter ever compares against.
pub fn relative_posix(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Turn a `/`-separated relative path back into a native path under `base`.
pub fn join_posix(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        #[cfg(unix)]
        let root = Path::new("/");
        #[cfg(windows)]
        let root = Path::new("C:");

        let input = root.join("nonexistent").join("foo").join("..").join("bar");
        let expected = root.join("nonexistent").join("bar");
        assert!(std::fs::canonicalize(&input).is_err());

        assert_eq!(resolve_absolute_path(&input), expected);
    }

    #[test]
    fn relative_posix_uses_forward_slashes() {
        let base = Path::new("project").join("public");
        let file = base.join("images").join("blog").join("cover.png");
        assert_eq!(
            relative_posix(&base, &file).as_deref(),
            Some("images/blog/cover.png")
        );
    }

    #[test]
    fn relative_posix_rejects_outside_and_self() {
        let base = Path::new("project").join("public");
        assert_eq!(relative_posix(&base, Path::new("elsewhere/a.png")), None);
        assert_eq!(relative_posix(&base, &base), None);
    }

    #[test]
    fn join_posix_round_trips_relative_path() {
        let base = Path::new("project").join("public");
        let joined = join_posix(&base, "images/blog/cover.webp");
        assert_eq!(
            joined,
            base.join("images").join("blog").join("cover.webp")
        );
        assert_eq!(
            relative_posix(&base, &joined).as_deref(),
            Some("images/blog/cover.webp")
        );
    }
}
