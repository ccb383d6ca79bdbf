//! Filesystem path normalization.

use std::path::{Path, PathBuf};

/// Absolute form of `path`, with symlinks resolved when it exists.
///
/// An empty path (the parent of a bare file name) means the current
/// directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}
