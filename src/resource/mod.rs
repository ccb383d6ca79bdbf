//! Resources: named, lazily loaded byte content with a freshness timestamp.
//!
//! # Variants
//!
//! | Type                  | Bytes from                    | Capability            |
//! |-----------------------|-------------------------------|-----------------------|
//! | [`ByteResource`]      | fixed buffer                  | `Plain`               |
//! | [`FileResource`]      | `base_dir/path` on disk       | `Scriptable`/`Lintable` |
//! | [`AggregatedResource`]| concatenated member resources | `Plain`               |
//!
//! Collections (`crate::collection`) build on `AggregatedResource`.
//!
//! # Freshness
//!
//! Every resource caches one [`Entry`] (`last_modified` + bytes). The entry
//! is stable until `check_modified()` reports a change: repeated reads return
//! the same `Arc`, so callers can use `Arc::ptr_eq` to detect rebuilds.
//! `last_modified <= 0` means the resource does not exist.

mod aggregated;
mod byte;
mod file;
pub mod lint;
pub mod requires;

pub use aggregated::{Aggregate, AggregateMode, AggregatedResource};
pub use byte::ByteResource;
pub use file::FileResource;
pub use lint::LintReport;

#[cfg(test)]
pub(crate) use aggregated::tests::FakeResource;
#[cfg(test)]
pub(crate) use file::touch;

use std::fmt;
use std::sync::Arc;

use crate::error::{BundleError, Result};
use crate::utils::mime;

/// Shared handle to any resource.
pub type ResourceRef = Arc<dyn Resource>;

/// Timestamp of a resource that does not exist.
pub const MISSING: i64 = -1;

/// Cached content of a resource.
#[derive(Debug)]
pub struct Entry {
    pub last_modified: i64,
    pub bytes: Arc<[u8]>,
    /// Lint report produced while reading the bytes (lintable resources only).
    pub lint: Option<Arc<LintReport>>,
}

impl Entry {
    pub fn new(last_modified: i64, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            last_modified,
            bytes: bytes.into(),
            lint: None,
        }
    }

    /// Entry of a resource that does not exist.
    pub fn missing() -> Self {
        Self::new(MISSING, Vec::new())
    }

    pub fn with_lint(mut self, report: Option<LintReport>) -> Self {
        self.lint = report.map(Arc::new);
        self
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.last_modified > 0
    }
}

/// Content classification, derived from the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Script,
    Stylesheet,
    Other,
}

impl ContentType {
    pub fn from_path(path: &str) -> Self {
        match mime::from_path(path) {
            mime::types::JAVASCRIPT => Self::Script,
            mime::types::CSS => Self::Stylesheet,
            _ => Self::Other,
        }
    }

    /// Extension of compiled artifacts of this type.
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Script => Some("js"),
            Self::Stylesheet => Some("css"),
            Self::Other => None,
        }
    }

    pub fn mime(self, path: &str) -> &'static str {
        match self {
            Self::Script => mime::types::JAVASCRIPT,
            Self::Stylesheet => mime::types::CSS,
            Self::Other => mime::from_path(path),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::Other => "other",
        })
    }
}

/// Optional behaviors a resource supports.
///
/// - `Plain`: bytes only; no requires tags, no lint report
/// - `Scriptable`: source text that may declare `@requires` tags
/// - `Lintable`: scriptable, and linted when its bytes are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Plain,
    Scriptable,
    Lintable,
}

impl Capability {
    #[inline]
    pub const fn carries_requires(self) -> bool {
        matches!(self, Self::Scriptable | Self::Lintable)
    }

    #[inline]
    pub const fn carries_lint(self) -> bool {
        matches!(self, Self::Lintable)
    }
}

/// A named, byte-addressable unit of content.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Prefix joined with [`path`](Self::path) to form the full path.
    fn base_path(&self) -> &str;

    /// Root-relative path; the identity of the resource.
    fn path(&self) -> Arc<str>;

    fn full_path(&self) -> String {
        format!("{}{}", self.base_path(), self.path())
    }

    fn content_type(&self) -> ContentType {
        ContentType::from_path(&self.path())
    }

    /// Name of the bundle this resource conceptually belongs to.
    fn origin(&self) -> Option<&str> {
        None
    }

    /// The cached entry, loading it on first access.
    fn entry(&self) -> Arc<Entry>;

    fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.entry().bytes)
    }

    fn last_modified(&self) -> i64 {
        self.entry().last_modified
    }

    fn exists(&self) -> bool {
        self.last_modified() > 0
    }

    /// Re-read freshness from the source; evict cached state on change.
    fn check_modified(&self) -> bool;

    fn capability(&self) -> Capability {
        Capability::Plain
    }

    /// Dependency paths declared in the content.
    ///
    /// Fails with [`BundleError::Unsupported`] unless the capability
    /// carries requires tags.
    fn find_requires_tags(&self) -> Result<Vec<String>> {
        if !self.capability().carries_requires() {
            return Err(BundleError::Unsupported {
                path: self.full_path(),
                operation: "requires tags",
            });
        }
        Ok(requires::extract(&self.bytes()))
    }

    fn lint_report(&self) -> Option<Arc<LintReport>> {
        if !self.capability().carries_lint() {
            return None;
        }
        self.entry().lint.clone()
    }
}

/// Newest timestamp among existing resources, or [`MISSING`].
pub fn newest<'a>(resources: impl IntoIterator<Item = &'a ResourceRef>) -> i64 {
    resources
        .into_iter()
        .map(|r| r.last_modified())
        .filter(|&t| t > 0)
        .max()
        .unwrap_or(MISSING)
}
