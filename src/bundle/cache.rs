//! Bounded path → resource cache.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{BundleError, Result};
use crate::resource::ResourceRef;

/// Resources a bundle has handed out, by full path.
///
/// Never evicts. Growing past `limit` distinct paths is a capacity error:
/// that many paths means unbounded probing or a misconfiguration.
#[derive(Debug)]
pub struct PathCache {
    entries: RwLock<FxHashMap<Arc<str>, ResourceRef>>,
    limit: usize,
}

impl PathCache {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            limit,
        }
    }

    pub fn get(&self, path: &str) -> Option<ResourceRef> {
        self.entries.read().get(path).cloned()
    }

    /// Cached resource for `path`, creating it with `make` on a miss.
    ///
    /// Concurrent misses on the same path create it once.
    pub fn get_or_insert_with(
        &self,
        path: &str,
        bundle: &str,
        make: impl FnOnce() -> ResourceRef,
    ) -> Result<ResourceRef> {
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }

        let mut entries = self.entries.write();
        if let Some(hit) = entries.get(path) {
            return Ok(hit.clone());
        }
        if entries.len() >= self.limit {
            return Err(BundleError::Capacity {
                bundle: bundle.to_string(),
                limit: self.limit,
            });
        }
        let resource = make();
        entries.insert(Arc::from(path), resource.clone());
        Ok(resource)
    }

    /// Snapshot of every cached resource.
    pub fn resources(&self) -> Vec<ResourceRef> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
