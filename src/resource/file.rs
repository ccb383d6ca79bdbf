//! File-backed resources.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use super::{Capability, ContentType, Entry, Resource, lint};
use crate::lazy::Lazy;
use crate::{debug, log};

/// A file under a bundle's base directory.
///
/// The entry is read on first access and kept until [`check_modified`]
/// sees a different mtime. A missing or unreadable file is a resource that
/// does not exist (`last_modified == -1`, empty bytes), never an error.
///
/// [`check_modified`]: Resource::check_modified
#[derive(Debug)]
pub struct FileResource {
    base_dir: PathBuf,
    base_path: String,
    path: Arc<str>,
    origin: Option<Arc<str>>,
    lint: bool,
    entry: Lazy<Entry>,
}

impl FileResource {
    /// `path` is relative to both `base_dir` (on disk) and `base_path`
    /// (logical prefix, e.g. `"core/"`).
    pub fn new(
        base_dir: impl Into<PathBuf>,
        base_path: impl Into<String>,
        path: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            base_path: base_path.into(),
            path: path.into(),
            origin: None,
            lint: false,
            entry: Lazy::new(),
        }
    }

    /// A standalone file, addressed by its own location.
    ///
    /// Used for config sources, which belong to no bundle.
    pub fn at(file: &Path) -> Self {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_path = if dir.as_os_str().is_empty() {
            String::new()
        } else {
            format!("{}/", dir.display())
        };
        Self::new(dir, base_path, name)
    }

    pub fn with_origin(mut self, origin: impl Into<Arc<str>>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Lint the file's script content whenever it is read.
    pub fn with_lint(mut self, lint: bool) -> Self {
        self.lint = lint;
        self
    }

    /// Location on disk.
    pub fn file_path(&self) -> PathBuf {
        self.base_dir.join(&*self.path)
    }

    fn load(&self) -> Entry {
        let file = self.file_path();
        let last_modified = mtime_millis(&file);
        if last_modified <= 0 {
            debug!("resource"; "not found: {}", file.display());
            return Entry::missing();
        }

        let bytes = match fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                log!("resource"; "cannot read {}: {}", file.display(), e);
                return Entry::missing();
            }
        };

        let report = match self.capability() {
            Capability::Lintable => lint::lint_script(&self.full_path(), &bytes),
            _ => None,
        };
        if let Some(report) = report.as_ref().filter(|r| !r.is_clean()) {
            debug!("lint"; "{}: {} issue(s)", self.full_path(), report.issues.len());
        }
        Entry::new(last_modified, bytes).with_lint(report)
    }
}

impl Resource for FileResource {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn path(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn entry(&self) -> Arc<Entry> {
        self.entry.get_or_init(|| self.load())
    }

    fn check_modified(&self) -> bool {
        let Some(entry) = self.entry.peek() else {
            return false;
        };
        if mtime_millis(&self.file_path()) == entry.last_modified {
            return false;
        }
        self.entry.invalidate();
        true
    }

    fn capability(&self) -> Capability {
        if self.lint && self.content_type() == ContentType::Script {
            Capability::Lintable
        } else {
            Capability::Scriptable
        }
    }
}

/// Modification time in milliseconds since the epoch, or `-1` if the file
/// cannot be stat'ed. An existing file always reports at least `1`.
pub fn mtime_millis(path: &Path) -> i64 {
    let Some(modified) = path
        .metadata()
        .ok()
        .filter(|m| m.is_file())
        .and_then(|m| m.modified().ok())
    else {
        return super::MISSING;
    };
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    millis.max(1)
}

/// Bump a file's mtime so tests see a change regardless of timestamp
/// granularity.
#[cfg(test)]
pub(crate) fn touch(path: &Path, offset_secs: u64) {
    let time = std::time::SystemTime::now() + std::time::Duration::from_secs(offset_secs);
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(content: &str) -> (TempDir, FileResource) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), content).unwrap();
        let resource = FileResource::new(dir.path(), "core/", "a.js").with_origin("core");
        (dir, resource)
    }

    #[test]
    fn test_reads_lazily_and_stably() {
        let (_dir, r) = fixture("var a;");
        assert_eq!(r.full_path(), "core/a.js");
        assert_eq!(&*r.bytes(), b"var a;");
        assert!(r.exists());
        assert!(Arc::ptr_eq(&r.bytes(), &r.bytes()));
        assert!(!r.check_modified());
        assert!(Arc::ptr_eq(&r.entry(), &r.entry()));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let r = FileResource::new(dir.path(), "core/", "nope.js");
        assert!(!r.exists());
        assert_eq!(r.last_modified(), -1);
        assert!(r.bytes().is_empty());
    }

    #[test]
    fn test_check_modified_evicts_entry() {
        let (dir, r) = fixture("var a;");
        let before = r.entry();

        fs::write(dir.path().join("a.js"), "var b;").unwrap();
        touch(&dir.path().join("a.js"), 10);

        assert!(r.check_modified());
        let after = r.entry();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(&*after.bytes, b"var b;");
        assert!(!r.check_modified());
    }

    #[test]
    fn test_unread_resource_is_not_modified() {
        let (dir, r) = fixture("var a;");
        touch(&dir.path().join("a.js"), 10);
        assert!(!r.check_modified());
    }

    #[test]
    fn test_deleted_file_reports_modified() {
        let (dir, r) = fixture("var a;");
        assert!(r.exists());
        fs::remove_file(dir.path().join("a.js")).unwrap();
        assert!(r.check_modified());
        assert!(!r.exists());
    }

    #[test]
    fn test_capability_and_lint() {
        let (_dir, r) = fixture("var = ;");
        assert_eq!(r.capability(), Capability::Scriptable);
        assert!(r.lint_report().is_none());

        let (_dir, r) = fixture("var = ;");
        let r = r.with_lint(true);
        assert_eq!(r.capability(), Capability::Lintable);
        assert!(!r.lint_report().unwrap().is_clean());
    }

    #[test]
    fn test_requires_tags() {
        let (_dir, r) = fixture("// @requires ./b.js\n// @requires lib/c.js\n");
        assert_eq!(r.find_requires_tags().unwrap(), vec!["./b.js", "lib/c.js"]);
    }

    #[test]
    fn test_stylesheet_never_lintable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.css"), "a{}").unwrap();
        let r = FileResource::new(dir.path(), "core/", "a.css").with_lint(true);
        assert_eq!(r.capability(), Capability::Scriptable);
    }

    #[test]
    fn test_at_uses_file_location() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("sheaf.toml");
        fs::write(&file, "").unwrap();
        let r = FileResource::at(&file);
        assert_eq!(r.file_path(), file);
        assert!(r.full_path().ends_with("/sheaf.toml"));
        assert!(r.origin().is_none());
    }
}
