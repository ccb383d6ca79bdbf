//! Requires-graph ordering.
//!
//! Roots and everything they transitively `@requires` become nodes of a
//! directed graph with edges from dependent to dependency. Tarjan's
//! algorithm (petgraph's iterative `tarjan_scc`) yields the strongly
//! connected components in reverse topological order, which is exactly the
//! build order: dependencies first.
//!
//! # Ordering
//!
//! Nodes are inserted roots first, in declared order, so the search starts
//! from each root in turn. petgraph walks a node's neighbors newest edge
//! first; edges are therefore inserted in reverse declaration order, which
//! makes the order of independent dependencies follow their `@requires`
//! order.
//!
//! # Precondition
//!
//! Cycle reports name members by full path only. Nodes need no owning
//! bundle for the ordering itself.

use std::collections::VecDeque;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BundleError, Result};
use crate::resolver::Resolve;
use crate::resource::ResourceRef;
use crate::utils::path::logical;
use crate::{debug, log};

/// Resources reachable from a root list, connected by requires edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceRef, ()>,
    index: FxHashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Discover the transitive requires closure of `roots`.
    ///
    /// Roots are kept even when they do not exist yet, but are not scanned.
    /// Tags that are invalid, unresolvable or name a missing resource are
    /// logged and skipped. Other resolver errors (e.g. a full path cache)
    /// abort discovery.
    pub fn discover(roots: &[ResourceRef], resolver: &dyn Resolve) -> Result<Self> {
        let mut this = Self::default();
        let mut queue = VecDeque::new();

        for root in roots {
            let (node, fresh) = this.insert(root);
            if fresh {
                queue.push_back(node);
            }
        }

        while let Some(node) = queue.pop_front() {
            let resource = this.graph[node].clone();
            if !resource.capability().carries_requires() || !resource.exists() {
                continue;
            }

            let from = resource.full_path();
            let mut targets = Vec::new();
            let mut seen = FxHashSet::default();
            for tag in resource.find_requires_tags()? {
                let path = logical::join_relative(&from, &tag);
                let target = match resolver.resolve(&path) {
                    Ok(Some(target)) if target.exists() => target,
                    Ok(_) => {
                        log!("graph"; "{}: required `{}` not found, skipping", from, tag);
                        continue;
                    }
                    Err(e @ BundleError::InvalidPath { .. }) => {
                        log!("graph"; "{}: {}, skipping", from, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let (target, fresh) = this.insert(&target);
                if fresh {
                    queue.push_back(target);
                }
                if target != node && seen.insert(target) {
                    targets.push(target);
                }
            }

            for &target in targets.iter().rev() {
                this.graph.add_edge(node, target, ());
            }
        }

        debug!(
            "graph";
            "{} resources, {} requires edges",
            this.graph.node_count(),
            this.graph.edge_count()
        );
        Ok(this)
    }

    fn insert(&mut self, resource: &ResourceRef) -> (NodeIndex, bool) {
        let key = resource.full_path();
        if let Some(&node) = self.index.get(&key) {
            return (node, false);
        }
        let node = self.graph.add_node(resource.clone());
        self.index.insert(key, node);
        (node, true)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Strongly connected components, dependencies before dependents.
    pub fn components(&self) -> Vec<Vec<ResourceRef>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|mut component| {
                component.sort_unstable();
                component.into_iter().map(|n| self.graph[n].clone()).collect()
            })
            .collect()
    }

    /// Linear build order, or a [`BundleError::Cycle`] naming every member
    /// of the first non-trivial component.
    pub fn build_order(&self, bundle: &str) -> Result<Vec<ResourceRef>> {
        linearize(self.components(), bundle)
    }
}

/// Flatten singleton components; any larger component is a cycle.
pub fn linearize(components: Vec<Vec<ResourceRef>>, bundle: &str) -> Result<Vec<ResourceRef>> {
    let mut order = Vec::with_capacity(components.len());
    for component in components {
        if component.len() > 1 {
            return Err(BundleError::Cycle {
                bundle: bundle.to_string(),
                chain: component.iter().map(|r| r.full_path()).collect(),
            });
        }
        order.extend(component);
    }
    Ok(order)
}
