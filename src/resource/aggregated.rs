//! Resources synthesized from an ordered list of other resources.

use std::sync::Arc;

use super::{ContentType, Entry, MISSING, Resource, ResourceRef, newest};
use crate::lazy::Lazy;

/// How member bytes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    /// Every aggregate, in order, into one stream.
    Concat,
    /// Scripts into the primary stream, stylesheets into a side stream.
    /// Other content types contribute nothing.
    SplitByContentType,
}

/// One build of an [`AggregatedResource`].
#[derive(Debug)]
pub struct Aggregate {
    pub entry: Arc<Entry>,
    /// Stylesheet side output; `Some` only in split mode.
    pub style: Option<Arc<[u8]>>,
    /// Member entries the build read: aggregates, then dependencies.
    pub sources: Vec<Arc<Entry>>,
}

impl Aggregate {
    /// Entries of the aggregates, in order.
    pub fn aggregate_sources(&self, count: usize) -> &[Arc<Entry>] {
        &self.sources[..count.min(self.sources.len())]
    }
}

/// Concatenation of `aggregates`, fresh as long as every aggregate and
/// dependency is.
///
/// Dependencies contribute freshness only. The built bytes are computed at
/// most once between invalidations.
#[derive(Debug)]
pub struct AggregatedResource {
    base_path: String,
    path: Arc<str>,
    aggregates: Vec<ResourceRef>,
    dependencies: Vec<ResourceRef>,
    mode: AggregateMode,
    built: Lazy<Aggregate>,
}

impl AggregatedResource {
    pub fn new(
        base_path: impl Into<String>,
        path: impl Into<Arc<str>>,
        aggregates: Vec<ResourceRef>,
        dependencies: Vec<ResourceRef>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            path: path.into(),
            aggregates,
            dependencies,
            mode: AggregateMode::Concat,
            built: Lazy::new(),
        }
    }

    pub fn with_mode(mut self, mode: AggregateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn aggregates(&self) -> &[ResourceRef] {
        &self.aggregates
    }

    /// The current build, building it on a miss.
    pub fn aggregate(&self) -> Arc<Aggregate> {
        self.built.get_or_init(|| self.build())
    }

    fn build(&self) -> Aggregate {
        let mut bytes = Vec::new();
        let mut style = Vec::new();
        let mut sources = Vec::with_capacity(self.aggregates.len() + self.dependencies.len());

        // One pass; both streams come from the same member entries.
        for member in &self.aggregates {
            let entry = member.entry();
            sources.push(Arc::clone(&entry));
            match (self.mode, member.content_type()) {
                (AggregateMode::Concat, _)
                | (AggregateMode::SplitByContentType, ContentType::Script) => {
                    bytes.extend_from_slice(&entry.bytes);
                }
                (AggregateMode::SplitByContentType, ContentType::Stylesheet) => {
                    style.extend_from_slice(&entry.bytes);
                }
                (AggregateMode::SplitByContentType, ContentType::Other) => {}
            }
        }

        sources.extend(self.dependencies.iter().map(|d| d.entry()));

        let last_modified = sources
            .iter()
            .map(|e| e.last_modified)
            .filter(|&t| t > 0)
            .max()
            .unwrap_or(MISSING);
        Aggregate {
            entry: Arc::new(Entry::new(last_modified, bytes)),
            style: match self.mode {
                AggregateMode::Concat => None,
                AggregateMode::SplitByContentType => Some(style.into()),
            },
            sources,
        }
    }
}

impl Resource for AggregatedResource {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn path(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    fn entry(&self) -> Arc<Entry> {
        Arc::clone(&self.aggregate().entry)
    }

    fn last_modified(&self) -> i64 {
        newest(self.aggregates.iter().chain(&self.dependencies))
    }

    /// Polls every member, even after one reported a change, so each
    /// member's own cache is refreshed.
    ///
    /// A member shared with another aggregate may have had its change
    /// consumed by that aggregate's poll; a member entry that is no longer
    /// the one the build read counts as modified too.
    fn check_modified(&self) -> bool {
        let mut modified = false;
        for member in self.aggregates.iter().chain(&self.dependencies) {
            modified |= member.check_modified();
        }
        if !modified && let Some(built) = self.built.peek() {
            modified = self
                .aggregates
                .iter()
                .chain(&self.dependencies)
                .zip(&built.sources)
                .any(|(member, read)| !Arc::ptr_eq(&member.entry(), read));
        }
        if modified {
            self.built.invalidate();
        }
        modified
    }
}
