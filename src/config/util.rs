//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/app/static/js/  ← cwd
/// /home/user/app/sheaf.toml  ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(&cwd, config_name)
}

fn find_config_file_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Whether `name` is a legal bundle name (`^[A-Za-z0-9_]+$`).
pub fn is_valid_bundle_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("static/js");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("sheaf.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("sheaf.toml")).unwrap();
        assert_eq!(found, dir.path().join("sheaf.toml"));
        assert!(find_config_file_from(&nested, Path::new("missing.toml")).is_none());
    }

    #[test]
    fn test_find_config_absolute() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bundles.json");
        fs::write(&file, "{}").unwrap();
        assert_eq!(find_config_file_from(Path::new("/"), &file), Some(file.clone()));
        assert!(find_config_file_from(Path::new("/"), &dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_bundle_names() {
        assert!(is_valid_bundle_name("core"));
        assert!(is_valid_bundle_name("Core_2"));
        assert!(!is_valid_bundle_name(""));
        assert!(!is_valid_bundle_name("core-ui"));
        assert!(!is_valid_bundle_name("core/ui"));
    }
}
