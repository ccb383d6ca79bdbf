//! Build generations of a bundle's collections.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::collection::ResourceCollection;
use crate::resource::Resource;

/// The collections of one build, in build order.
#[derive(Debug, Default)]
pub struct Generation {
    collections: Vec<Arc<ResourceCollection>>,
}

impl Generation {
    pub fn new(collections: Vec<Arc<ResourceCollection>>) -> Self {
        Self { collections }
    }

    pub fn collections(&self) -> &[Arc<ResourceCollection>] {
        &self.collections
    }

    /// Collection whose identity is `path` (`<origin>-<fingerprint>`).
    pub fn find(&self, path: &str) -> Option<&Arc<ResourceCollection>> {
        self.collections.iter().find(|c| &*c.path() == path)
    }
}

/// Collections of retired generations, by identity.
///
/// Handed from an invalidation to the next build, which reuses any
/// instance whose identity it reproduces.
#[derive(Debug, Default)]
pub struct PreviousCollections {
    by_path: FxHashMap<Arc<str>, Arc<ResourceCollection>>,
}

impl PreviousCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retire the collections of `generation` under their current
    /// identity. Collections whose identity was invalidated are dropped.
    pub fn retire(generation: &Generation) -> Self {
        let mut previous = Self::new();
        for collection in generation.collections() {
            if let Some(identity) = collection.identity() {
                previous.by_path.insert(identity, Arc::clone(collection));
            }
        }
        previous
    }

    /// Merge `other` in; its entries win.
    pub fn absorb(&mut self, other: Self) {
        self.by_path.extend(other.by_path);
    }

    /// Keep only collections whose origin bundle passes `keep`.
    pub fn retain_origins(&mut self, keep: impl Fn(&str) -> bool) {
        self.by_path
            .retain(|_, collection| keep(collection.origin().unwrap_or(collection.owner())));
    }

    /// Remove and return the collection with identity `path`.
    pub fn take(&mut self, path: &str) -> Option<Arc<ResourceCollection>> {
        self.by_path.remove(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
