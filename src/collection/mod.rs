//! Per-origin aggregates of a bundle's build order.
//!
//! A [`ResourceCollection`] is owned by the bundle that built it but holds
//! the resources of one *origin* bundle (usually the owner itself). Its
//! path is a content fingerprint over the members' paths and timestamps,
//! so every build generation gets a distinct artifact name:
//!
//! ```text
//! <owner>/<origin>-<fingerprint>       collection
//! <owner>/<origin>-<fingerprint>.js    compressed scripts
//! <owner>/<origin>-<fingerprint>.css   compressed stylesheets
//! ```
//!
//! # Cache layers
//!
//! | Layer        | Built from            | Invalidated by            |
//! |--------------|-----------------------|---------------------------|
//! | member entry | disk                  | member `check_modified`   |
//! | aggregate    | member entries        | collection `check_modified` |
//! | identity     | member paths + mtimes | collection `check_modified` |
//! | compressed   | aggregate + compressor| collection `check_modified` |

mod summary;

pub use summary::CollectionSummary;

use std::sync::Arc;

use crate::compress::{Compressor, Compressors};
use crate::error::{BundleError, Result};
use crate::lazy::Lazy;
use crate::resource::{
    Aggregate, AggregateMode, AggregatedResource, ByteResource, ContentType, Entry, MISSING,
    Resource, ResourceRef,
};
use crate::utils::hash::Fingerprinter;

/// Aggregated scripts and stylesheets of one origin bundle.
#[derive(Debug)]
pub struct ResourceCollection {
    owner: Arc<str>,
    origin: Arc<str>,
    inner: AggregatedResource,
    identity: Lazy<Arc<str>>,
    compressors: Compressors,
    script: Lazy<ByteResource>,
    style: Lazy<ByteResource>,
}

impl ResourceCollection {
    pub fn new(
        owner: impl Into<Arc<str>>,
        origin: impl Into<Arc<str>>,
        aggregates: Vec<ResourceRef>,
        dependencies: Vec<ResourceRef>,
        compressors: Compressors,
    ) -> Self {
        let owner = owner.into();
        let origin = origin.into();
        let inner = AggregatedResource::new(
            format!("{owner}/"),
            Arc::clone(&origin),
            aggregates,
            dependencies,
        )
        .with_mode(AggregateMode::SplitByContentType);
        Self {
            owner,
            origin,
            inner,
            identity: Lazy::new(),
            compressors,
            script: Lazy::new(),
            style: Lazy::new(),
        }
    }

    /// Name of the bundle that built this collection.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn aggregates(&self) -> &[ResourceRef] {
        self.inner.aggregates()
    }

    fn aggregate(&self) -> Arc<Aggregate> {
        self.inner.aggregate()
    }

    /// Concatenated script members, in build order.
    pub fn script_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.aggregate().entry.bytes)
    }

    /// Concatenated stylesheet members, from the same build as
    /// [`script_bytes`](Self::script_bytes).
    pub fn style_bytes(&self) -> Arc<[u8]> {
        self.aggregate().style.clone().unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Compressed script artifact, `<path>.js`.
    ///
    /// Does not exist (`last_modified <= 0`) when no script member exists.
    pub fn compressed_script(&self) -> Result<Arc<ByteResource>> {
        self.compressed(ContentType::Script)
    }

    /// Compressed stylesheet artifact, `<path>.css`.
    pub fn compressed_style(&self) -> Result<Arc<ByteResource>> {
        self.compressed(ContentType::Stylesheet)
    }

    /// Compressed artifact by extension (`"js"` or `"css"`).
    pub fn compressed_by_extension(&self, extension: &str) -> Option<Result<Arc<ByteResource>>> {
        match extension {
            "js" => Some(self.compressed_script()),
            "css" => Some(self.compressed_style()),
            _ => None,
        }
    }

    fn compressed(&self, kind: ContentType) -> Result<Arc<ByteResource>> {
        let (cell, compressor, extension): (_, &Arc<dyn Compressor>, _) = match kind {
            ContentType::Stylesheet => (&self.style, &self.compressors.style, "css"),
            _ => (&self.script, &self.compressors.script, "js"),
        };

        cell.get_or_try_init(|| -> Result<ByteResource> {
            let aggregate = self.aggregate();
            let raw: &[u8] = match kind {
                ContentType::Stylesheet => aggregate.style.as_deref().unwrap_or_default(),
                _ => &aggregate.entry.bytes,
            };
            let path = format!("{}.{}", self.path(), extension);

            let bytes = if raw.is_empty() {
                Vec::new()
            } else {
                compressor.compress(raw).map_err(|source| BundleError::Compress {
                    path: format!("{}{}", self.base_path(), path),
                    source,
                })?
            };

            let last_modified = self
                .aggregates()
                .iter()
                .zip(aggregate.aggregate_sources(self.aggregates().len()))
                .filter(|(member, _)| member.content_type() == kind)
                .map(|(_, read)| read.last_modified)
                .filter(|&t| t > 0)
                .max()
                .unwrap_or(MISSING);
            Ok(ByteResource::new(self.base_path(), path, bytes, last_modified)
                .with_origin(Arc::clone(&self.origin)))
        })
    }

    /// Hash over `(full path, last modified)` of every aggregate, as read
    /// by the current build.
    fn fingerprint(&self) -> Arc<str> {
        let aggregate = self.aggregate();
        let mut hasher = Fingerprinter::new();
        for (member, read) in self
            .aggregates()
            .iter()
            .zip(aggregate.aggregate_sources(self.aggregates().len()))
        {
            hasher.str(&member.full_path()).i64(read.last_modified);
        }
        format!("{}-{}", self.origin, hasher.finish()).into()
    }

    /// The cached identity, without computing it.
    pub fn identity(&self) -> Option<Arc<str>> {
        self.identity.peek().map(|identity| Arc::clone(&*identity))
    }

    /// Summary for the produced interface.
    pub fn summary(&self) -> Result<CollectionSummary> {
        CollectionSummary::of(self)
    }
}

impl Resource for ResourceCollection {
    fn base_path(&self) -> &str {
        self.inner.base_path()
    }

    /// `<origin>-<fingerprint>`, cached until the collection is modified.
    fn path(&self) -> Arc<str> {
        Arc::clone(&self.identity.get_or_init(|| self.fingerprint()))
    }

    fn content_type(&self) -> ContentType {
        ContentType::Script
    }

    fn origin(&self) -> Option<&str> {
        Some(&self.origin)
    }

    fn entry(&self) -> Arc<Entry> {
        self.inner.entry()
    }

    fn last_modified(&self) -> i64 {
        self.inner.last_modified()
    }

    fn check_modified(&self) -> bool {
        if !self.inner.check_modified() {
            return false;
        }
        self.identity.invalidate();
        self.script.invalidate();
        self.style.invalidate();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::tests::{Broken, stripping};
    use crate::resource::FakeResource;

    fn collection(members: &[&Arc<FakeResource>]) -> ResourceCollection {
        let aggregates = members.iter().map(|r| Arc::clone(*r) as ResourceRef).collect();
        ResourceCollection::new("app", "app", aggregates, vec![], stripping())
    }

    #[test]
    fn test_script_and_style_split() {
        let a_js = FakeResource::new("app/a.js", "var a = 1;\n", 10).shared();
        let a_css = FakeResource::new("app/a.css", "a { color: red; }\n", 20).shared();
        let b_js = FakeResource::new("app/b.js", "var b = 2;\n", 30).shared();
        let c = collection(&[&a_js, &a_css, &b_js]);

        assert_eq!(&*c.script_bytes(), b"var a = 1;\nvar b = 2;\n");
        assert_eq!(&*c.style_bytes(), b"a { color: red; }\n");
        assert_eq!(&*c.bytes(), &*c.script_bytes());
        assert_eq!(c.last_modified(), 30);
    }

    #[test]
    fn test_compressed_script() {
        let a_js = FakeResource::new("app/a.js", "var a = 1;\n", 10).shared();
        let b_js = FakeResource::new("app/b.js", "var b = 2;\n", 30).shared();
        let a_css = FakeResource::new("app/a.css", "a { color: red; }", 50).shared();
        let c = collection(&[&a_js, &b_js, &a_css]);

        let js = c.compressed_script().unwrap();
        assert_eq!(&*js.bytes(), b"vara=1;varb=2;");
        assert_eq!(js.last_modified(), 30);
        assert_eq!(js.full_path(), format!("app/{}.js", c.path()));
        assert_eq!(js.origin(), Some("app"));
        assert!(Arc::ptr_eq(&js, &c.compressed_script().unwrap()));

        let css = c.compressed_style().unwrap();
        assert_eq!(&*css.bytes(), b"a{color:red;}");
        assert_eq!(css.last_modified(), 50);
    }

    #[test]
    fn test_no_members_of_type_means_missing_artifact() {
        let a_js = FakeResource::new("app/a.js", "var a;", 10).shared();
        let c = collection(&[&a_js]);

        let css = c.compressed_style().unwrap();
        assert!(css.bytes().is_empty());
        assert!(!css.exists());
        assert_eq!(css.last_modified(), MISSING);
    }

    #[test]
    fn test_identity_is_stable_fingerprint() {
        let a1 = FakeResource::new("app/a.js", "x", 10).shared();
        let a2 = FakeResource::new("app/a.js", "y", 10).shared();
        let first = collection(&[&a1]);
        let second = collection(&[&a2]);

        assert_eq!(first.path(), second.path());
        assert!(first.path().starts_with("app-"));

        let a3 = FakeResource::new("app/a.js", "x", 11).shared();
        assert_ne!(first.path(), collection(&[&a3]).path());
    }

    #[test]
    fn test_identity_depends_on_membership_and_order() {
        let a = FakeResource::new("app/a.js", "", 10).shared();
        let b = FakeResource::new("app/b.js", "", 10).shared();
        assert_ne!(collection(&[&a]).path(), collection(&[&a, &b]).path());
        assert_ne!(collection(&[&a, &b]).path(), collection(&[&b, &a]).path());
    }

    #[test]
    fn test_modification_invalidates_every_layer() {
        let a_js = FakeResource::new("app/a.js", "var a;", 10).shared();
        let c = collection(&[&a_js]);
        let path = c.path();
        let js = c.compressed_script().unwrap();

        assert!(!c.check_modified());
        assert_eq!(c.path(), path);

        a_js.update("var b;", 20);
        assert!(c.check_modified());
        assert_ne!(c.path(), path);
        let rebuilt = c.compressed_script().unwrap();
        assert!(!Arc::ptr_eq(&js, &rebuilt));
        assert_eq!(&*rebuilt.bytes(), b"varb;");
        assert_eq!(rebuilt.last_modified(), 20);
    }

    #[test]
    fn test_identity_peek_does_not_compute() {
        let a_js = FakeResource::new("app/a.js", "var a;", 10).shared();
        let c = collection(&[&a_js]);
        assert!(c.identity().is_none());
        let path = c.path();
        assert_eq!(c.identity(), Some(path));

        a_js.update("var b;", 20);
        assert!(c.check_modified());
        assert!(c.identity().is_none());
    }

    #[test]
    fn test_no_stale_artifact_after_concurrent_modification() {
        let a_js = FakeResource::new("app/a.js", "var v0;", 10).shared();
        let c = collection(&[&a_js]);
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(std::sync::atomic::Ordering::Relaxed) {
                        c.compressed_script().unwrap();
                        c.path();
                    }
                });
            }

            for i in 1..=50 {
                a_js.update(&format!("var v{i};"), 10 + i);
                assert!(c.check_modified());
                let js = c.compressed_script().unwrap();
                assert_eq!(&*js.bytes(), format!("varv{i};").as_bytes());
                assert_eq!(js.last_modified(), 10 + i);
            }
            done.store(true, std::sync::atomic::Ordering::Relaxed);
        });
    }

    #[test]
    fn test_compression_failure_is_not_cached() {
        let a_js = FakeResource::new("app/a.js", "var a;", 10).shared();
        let compressors = Compressors {
            script: Arc::new(Broken),
            style: Arc::new(Broken),
        };
        let c = ResourceCollection::new("app", "app", vec![a_js as ResourceRef], vec![], compressors);

        let err = c.compressed_script().unwrap_err();
        assert!(matches!(err, BundleError::Compress { .. }));
        assert!(c.compressed_script().is_err());
        assert!(c.compressed_style().unwrap().bytes().is_empty());
    }

    #[test]
    fn test_compressed_by_extension() {
        let a_js = FakeResource::new("app/a.js", "var a;", 10).shared();
        let c = collection(&[&a_js]);
        assert!(c.compressed_by_extension("js").is_some());
        assert!(c.compressed_by_extension("css").is_some());
        assert!(c.compressed_by_extension("map").is_none());
    }

    #[test]
    fn test_cross_origin_collection() {
        let lib = FakeResource::new("lib/dom.js", "dom();", 5).with_origin("lib").shared();
        let c = ResourceCollection::new("app", "lib", vec![lib as ResourceRef], vec![], stripping());
        assert_eq!(c.owner(), "app");
        assert_eq!(c.origin(), Some("lib"));
        assert!(c.full_path().starts_with("app/lib-"));
    }
}
