//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// Uses `fs::canonicalize` when the path exists; otherwise the path is made
/// absolute relative to CWD and `..`/`.` components are resolved syntactically.
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

/// Rewrite backslash separators as forward slashes.
pub fn to_forward_slashes(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Forward-slash form of `path`'s parent directory, always ending in `/`.
///
/// A path without a parent (a bare root) yields `"/"`.
pub fn parent_path_string(path: &Path) -> String {
    let Some(parent) = path.parent() else {
        return "/".to_string();
    };
    let mut parent = to_forward_slashes(&parent.to_string_lossy());
    if !parent.ends_with('/') {
        parent.push('/');
    }
    parent
}

/// Final component of a forward-slash parent path (`"/a/b/"` → `"b"`).
pub fn last_component(parent_path: &str) -> &str {
    parent_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
