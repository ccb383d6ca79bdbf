//! Bundles: named file lists built into per-origin collections.
//!
//! # Resolution
//!
//! ```text
//! resolve("core/core-<fp>.css")
//!   ├─ looks like an artifact and a current collection has that identity
//!   │    → its compressed stylesheet
//!   └─ otherwise → generic: `matches` allow-list, then the path cache
//!                  (file resource under the bundle's base path)
//! ```
//!
//! # Collections
//!
//! ```text
//! Unbuilt ──resource_collections()──▶ Built(Generation)
//!    ▲                                      │
//!    └──── check_modified() == true ────────┘  (retired into PreviousCollections)
//! ```
//!
//! A build resolves the file list, orders it with the requires graph,
//! partitions the order by origin bundle, and makes one collection per
//! origin. A collection whose identity matches a retired one is replaced by
//! the retired instance, keeping its compressed artifacts.

mod cache;
mod generation;

pub use cache::PathCache;
pub use generation::{Generation, PreviousCollections};

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::collection::{CollectionSummary, ResourceCollection};
use crate::compress::Compressors;
use crate::config::{BundleConfig, ResolverOptions, is_valid_bundle_name};
use crate::error::{BundleError, Result};
use crate::graph::DependencyGraph;
use crate::lazy::Lazy;
use crate::resolver::Resolve;
use crate::resource::{FileResource, MISSING, Resource, ResourceRef};
use crate::utils::hash::FINGERPRINT_LEN;
use crate::{debug, log};

/// One configured bundle.
#[derive(Debug)]
pub struct Bundle {
    config: Arc<BundleConfig>,
    name: Arc<str>,
    cache: PathCache,
    collections: Lazy<Generation>,
    previous: Mutex<PreviousCollections>,
    compressors: Compressors,
}

impl Bundle {
    pub fn new(config: BundleConfig, options: &ResolverOptions) -> Self {
        let compressors = Compressors::minifying(&config.name, &config.js_compile_args);
        Self {
            name: Arc::from(config.name.as_str()),
            config: Arc::new(config),
            cache: PathCache::new(options.max_cached_paths),
            collections: Lazy::new(),
            previous: Mutex::new(PreviousCollections::new()),
            compressors,
        }
    }

    pub fn with_compressors(mut self, compressors: Compressors) -> Self {
        self.compressors = compressors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Number of distinct paths resolved so far.
    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a normalized path starting with `<name>/`.
    ///
    /// Returns `Ok(None)` for paths the `matches` allow-list rejects. Any
    /// other path yields a resource, which may not exist.
    ///
    /// Inside a bundle build an artifact path only matches an already built
    /// generation; it never starts or waits for a build.
    pub fn resolve(&self, path: &str, resolver: &dyn Resolve) -> Result<Option<ResourceRef>> {
        if let Some((identity, extension)) = self.parse_artifact(path) {
            let generation = if BuildScope::active() {
                self.collections.peek()
            } else {
                Some(self.resource_collections(resolver)?)
            };
            if let Some(generation) = generation
                && let Some(collection) = generation.find(identity)
                && let Some(artifact) = collection.compressed_by_extension(extension)
            {
                let artifact: ResourceRef = artifact?;
                return Ok(Some(artifact));
            }
            debug!("bundle"; "`{}`: no current collection `{}`", self.name, identity);
        }
        self.resolve_file(path)
    }

    fn resolve_file(&self, path: &str) -> Result<Option<ResourceRef>> {
        if !self.config.allows(path) {
            return Ok(None);
        }
        let resource = self.cache.get_or_insert_with(path, &self.name, || {
            Arc::new(
                FileResource::new(&self.config.base_path, "", path)
                    .with_origin(Arc::clone(&self.name))
                    .with_lint(self.config.js_lint),
            )
        })?;
        Ok(Some(resource))
    }

    /// `<name>/<origin>-<fingerprint>.<js|css>` → (`<origin>-<fingerprint>`, extension)
    fn parse_artifact<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let file = path.strip_prefix(&*self.name)?.strip_prefix('/')?;
        let (identity, extension) = file.rsplit_once('.')?;
        if !matches!(extension, "js" | "css") {
            return None;
        }
        let (origin, fingerprint) = identity.rsplit_once('-')?;
        let plausible = is_valid_bundle_name(origin)
            && fingerprint.len() == FINGERPRINT_LEN
            && fingerprint
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        plausible.then_some((identity, extension))
    }

    /// The current generation of collections, building it on first use.
    ///
    /// A failed build leaves the previous generation's retired collections
    /// in place for the next attempt.
    pub fn resource_collections(&self, resolver: &dyn Resolve) -> Result<Arc<Generation>> {
        self.collections.get_or_try_init(|| self.build(resolver))
    }

    fn build(&self, resolver: &dyn Resolve) -> Result<Generation> {
        let _scope = BuildScope::enter();
        let mut roots = Vec::with_capacity(self.config.files.len());
        for file in &self.config.files {
            match resolver.resolve(file) {
                Ok(Some(resource)) => {
                    if !resource.exists() {
                        log!("bundle"; "`{}`: `{}` does not exist yet", self.name, file);
                    }
                    roots.push(resource);
                }
                Ok(None) => log!("bundle"; "`{}`: nothing found for `{}`, ignoring", self.name, file),
                Err(e @ BundleError::InvalidPath { .. }) => {
                    log!("bundle"; "`{}`: {}, ignoring", self.name, e);
                }
                Err(e) => return Err(e),
            }
        }

        let order = DependencyGraph::discover(&roots, resolver)?.build_order(&self.name)?;
        let mut previous = std::mem::take(&mut *self.previous.lock());

        let mut collections = Vec::new();
        let mut reused = 0;
        for (origin, members) in partition(order, &self.name) {
            let fresh = ResourceCollection::new(
                Arc::clone(&self.name),
                origin,
                members,
                Vec::new(),
                self.compressors.clone(),
            );
            match previous.take(&fresh.path()) {
                Some(retired) => {
                    reused += 1;
                    collections.push(retired);
                }
                None => collections.push(Arc::new(fresh)),
            }
        }

        debug!(
            "bundle";
            "`{}`: built {} collection(s), {} reused, {} retired dropped",
            self.name,
            collections.len(),
            reused,
            previous.len()
        );
        Ok(Generation::new(collections))
    }

    /// Drop the current generation, handing its collections back for reuse
    /// by the next build.
    pub fn invalidate(&self) -> Option<PreviousCollections> {
        self.collections
            .take()
            .map(|generation| PreviousCollections::retire(&generation))
    }

    /// The current generation's collections, without invalidating it.
    pub fn snapshot(&self) -> Option<PreviousCollections> {
        self.collections
            .peek()
            .map(|generation| PreviousCollections::retire(&generation))
    }

    /// Offer retired collections to the next build.
    pub fn seed(&self, previous: PreviousCollections) {
        self.previous.lock().absorb(previous);
    }

    /// Poll every collection of the current generation; on any change,
    /// retire the generation. An unbuilt bundle is never modified.
    ///
    /// Only unmodified collections are offered for reuse; a modified one
    /// keeps no identity and is rebuilt lazily by the next build.
    pub fn check_modified(&self) -> bool {
        let Some(generation) = self.collections.peek() else {
            return false;
        };

        let mut modified = false;
        for collection in generation.collections() {
            modified |= collection.check_modified();
        }
        if modified && let Some(previous) = self.invalidate() {
            self.seed(previous);
        }
        modified
    }

    /// Whether a generation is currently built.
    pub fn is_built(&self) -> bool {
        self.collections.peek().is_some()
    }

    /// Poll every resource this bundle has resolved, so that a build
    /// after a failed one reads current content. Returns whether any
    /// changed.
    pub fn refresh_resolved(&self) -> bool {
        let mut modified = false;
        for resource in self.cache.resources() {
            modified |= resource.check_modified();
        }
        modified
    }

    /// Newest of the config source and every collection.
    pub fn last_modified(&self, resolver: &dyn Resolve) -> Result<i64> {
        let generation = self.resource_collections(resolver)?;
        let collections = generation
            .collections()
            .iter()
            .map(|c| c.last_modified())
            .max()
            .unwrap_or(MISSING);
        Ok(collections.max(self.config.config_resource.last_modified()))
    }

    pub fn summaries(&self, resolver: &dyn Resolve) -> Result<Vec<CollectionSummary>> {
        self.resource_collections(resolver)?
            .collections()
            .iter()
            .map(|c| c.summary())
            .collect()
    }
}

thread_local! {
    /// Bundle builds running on this thread.
    static BUILD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running a bundle build.
struct BuildScope;

impl BuildScope {
    fn enter() -> Self {
        BUILD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }

    fn active() -> bool {
        BUILD_DEPTH.with(|depth| depth.get() > 0)
    }
}

impl Drop for BuildScope {
    fn drop(&mut self) {
        BUILD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Group a build order by origin bundle, in order of first appearance,
/// keeping the build order within each group.
///
/// Resources without an origin are grouped under `owner`.
fn partition(order: Vec<ResourceRef>, owner: &Arc<str>) -> Vec<(Arc<str>, Vec<ResourceRef>)> {
    let mut groups: Vec<(Arc<str>, Vec<ResourceRef>)> = Vec::new();
    let mut index: FxHashMap<Arc<str>, usize> = FxHashMap::default();
    for resource in order {
        let origin: Arc<str> = resource.origin().map_or_else(|| Arc::clone(owner), Arc::from);
        let slot = *index.entry(Arc::clone(&origin)).or_insert_with(|| {
            groups.push((origin, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(resource);
    }
    groups
}
