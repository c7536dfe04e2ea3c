//! Dependency graph for incremental builds.
//!
//! Directed graph over source documents: an edge `from -> to` means `from`
//! imports `to`, so `to` must be compiled first.
//!
//! Two layers:
//! - `Graph`: plain data + algorithms, no locking
//! - `DependencyGraph`: one reader/writer lock over the whole `Graph`
//!
//! # Invariants
//! - `dependencies` and `dependents` are mutual inverses
//! - no edge references a node absent from the graph
//! - the edge relation is acyclic; cycle-creating mutations are rejected
//!   before anything is written
//! - iteration is by identity order, so every derived order is deterministic

mod cycle;
mod error;
mod node;
mod order;
mod traverse;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::core::DocumentKind;
use crate::utils::hash::ContentHash;

pub use error::{GraphError, format_cycle};
pub use node::DocumentNode;

type Nodes = BTreeMap<PathBuf, DocumentNode>;

// =============================================================================
// Layer 1: Data Structure
// =============================================================================

/// Unlocked graph state. Ordering, cycle and traversal algorithms are
/// implemented on this type in the sibling modules.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    nodes: Nodes,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or update the kind of an existing one.
    ///
    /// Returns `true` when the node was created.
    pub fn add_node(&mut self, id: &Path, kind: DocumentKind) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.kind = kind;
                false
            }
            None => {
                self.nodes
                    .insert(id.to_path_buf(), DocumentNode::new(id.to_path_buf(), kind));
                true
            }
        }
    }

    /// Remove a node and strip it from every neighbour.
    ///
    /// The returned node still carries its last edge lists.
    pub fn remove_node(&mut self, id: &Path) -> Result<DocumentNode, GraphError> {
        let removed = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_path_buf()))?;

        for dep in &removed.dependencies {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.remove_dependent(id);
            }
        }
        for dependent in &removed.dependents {
            if let Some(node) = self.nodes.get_mut(dependent) {
                node.remove_dependency(id);
            }
        }

        Ok(removed)
    }

    /// Add `from -> to`. Idempotent; validated completely before writing.
    pub fn add_dependency(&mut self, from: &Path, to: &Path) -> Result<(), GraphError> {
        let from_node = self
            .nodes
            .get(from)
            .ok_or_else(|| GraphError::UnknownNode(from.to_path_buf()))?;
        if !self.nodes.contains_key(to) {
            return Err(GraphError::UnknownNode(to.to_path_buf()));
        }
        if from == to {
            return Err(GraphError::SelfDependency(from.to_path_buf()));
        }
        if from_node.depends_on(to) {
            return Ok(());
        }
        // `to` already reaches `from`: the new edge closes the loop
        if let Some(back) = self.shortest_path(to, from) {
            let mut cycle = Vec::with_capacity(back.len() + 1);
            cycle.push(from.to_path_buf());
            cycle.extend(back);
            return Err(GraphError::WouldCycle {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                cycle,
            });
        }

        self.link(from, to);
        Ok(())
    }

    /// Remove `from -> to`. Missing edges and unknown nodes are a no-op.
    pub fn remove_dependency(&mut self, from: &Path, to: &Path) {
        let removed = self
            .nodes
            .get_mut(from)
            .is_some_and(|node| node.remove_dependency(to));
        if removed && let Some(node) = self.nodes.get_mut(to) {
            node.remove_dependent(from);
        }
    }

    /// Replace every outgoing edge of `from` with `deps`, kept in order.
    ///
    /// All-or-nothing: unknown targets, self-imports and cycles are
    /// rejected before anything is written. Returns `true` when the edge
    /// list changed.
    pub fn replace_dependencies(
        &mut self,
        from: &Path,
        deps: &[PathBuf],
    ) -> Result<bool, GraphError> {
        let old = self
            .nodes
            .get(from)
            .map(|n| n.dependencies.clone())
            .ok_or_else(|| GraphError::UnknownNode(from.to_path_buf()))?;

        let mut new: Vec<PathBuf> = Vec::with_capacity(deps.len());
        for dep in deps {
            if new.contains(dep) {
                continue;
            }
            if !self.nodes.contains_key(dep) {
                return Err(GraphError::UnknownNode(dep.clone()));
            }
            if dep == from {
                return Err(GraphError::SelfDependency(from.to_path_buf()));
            }
            new.push(dep.clone());
        }
        if new == old {
            return Ok(false);
        }

        // A path back to `from` never leaves through `from`'s own edges,
        // so checking against the current graph is enough.
        for dep in new.iter().filter(|d| !old.contains(*d)) {
            if let Some(back) = self.shortest_path(dep, from) {
                let mut cycle = Vec::with_capacity(back.len() + 1);
                cycle.push(from.to_path_buf());
                cycle.extend(back);
                return Err(GraphError::WouldCycle {
                    from: from.to_path_buf(),
                    to: dep.clone(),
                    cycle,
                });
            }
        }

        for dep in old.iter().filter(|d| !new.contains(*d)) {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.remove_dependent(from);
            }
        }
        for dep in &new {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.add_dependent(from);
            }
        }
        if let Some(node) = self.nodes.get_mut(from) {
            node.dependencies = new;
        }
        Ok(true)
    }

    /// Load many edges as one transaction.
    ///
    /// Endpoints are checked up front; if the combined edge set contains a
    /// cycle the graph is restored and the first cycle found is returned.
    pub fn bulk_load(&mut self, edges: &[(PathBuf, PathBuf)]) -> Result<(), GraphError> {
        for (from, to) in edges {
            for id in [from, to] {
                if !self.nodes.contains_key(id) {
                    return Err(GraphError::UnknownNode(id.clone()));
                }
            }
            if from == to {
                return Err(GraphError::SelfDependency(from.clone()));
            }
        }

        let snapshot = self.nodes.clone();
        for (from, to) in edges {
            self.link(from, to);
        }

        if let Err(e) = self.compilation_order() {
            self.nodes = snapshot;
            return Err(e);
        }
        Ok(())
    }

    /// Direct dependencies in import order. Unknown id → empty.
    pub fn dependencies(&self, id: &Path) -> Vec<PathBuf> {
        self.nodes
            .get(id)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default()
    }

    /// Direct dependents, sorted. Unknown id → empty.
    pub fn dependents(&self, id: &Path) -> Vec<PathBuf> {
        self.nodes
            .get(id)
            .map(|n| n.dependents.clone())
            .unwrap_or_default()
    }

    pub fn node(&self, id: &Path) -> Option<&DocumentNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node identities in deterministic order.
    pub fn ids(&self) -> Vec<PathBuf> {
        self.nodes.keys().cloned().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DocumentNode> {
        self.nodes.values()
    }

    /// Check referential integrity and acyclicity.
    ///
    /// Detects corruption from out-of-band mutation: dangling edges, edges
    /// without their inverse, and cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (id, node) in &self.nodes {
            for dep in &node.dependencies {
                let target = self.nodes.get(dep).ok_or_else(|| GraphError::DanglingEdge {
                    from: id.clone(),
                    to: dep.clone(),
                })?;
                if !target.dependents.contains(id) {
                    return Err(GraphError::InconsistentEdge {
                        from: id.clone(),
                        to: dep.clone(),
                    });
                }
            }
            for dependent in &node.dependents {
                let source = self
                    .nodes
                    .get(dependent)
                    .ok_or_else(|| GraphError::DanglingEdge {
                        from: dependent.clone(),
                        to: id.clone(),
                    })?;
                if !source.depends_on(id) {
                    return Err(GraphError::InconsistentEdge {
                        from: dependent.clone(),
                        to: id.clone(),
                    });
                }
            }
        }

        self.compilation_order().map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Private
    // -------------------------------------------------------------------------

    /// Write both directions of an edge without validation.
    fn link(&mut self, from: &Path, to: &Path) {
        if let Some(node) = self.nodes.get_mut(from)
            && !node.depends_on(to)
        {
            node.dependencies.push(to.to_path_buf());
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.add_dependent(from);
        }
    }

    /// Test-only: write an edge bypassing every check, to simulate corruption.
    #[cfg(test)]
    pub(crate) fn force_edge(&mut self, from: &Path, to: &Path) {
        if let Some(node) = self.nodes.get_mut(from) {
            node.dependencies.push(to.to_path_buf());
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.add_dependent(from);
        }
    }
}

// =============================================================================
// Layer 2: Locked Graph
// =============================================================================

/// Thread-safe dependency graph.
///
/// Read-only queries share the lock; mutations take it exclusively, so a
/// query never observes a half-applied edit.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: RwLock<Graph>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the graph with a read lock for several queries at once.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Graph) -> R,
    {
        f(&self.inner.read())
    }

    // --- mutation ------------------------------------------------------------

    pub fn add_node(&self, id: &Path, kind: DocumentKind) -> bool {
        self.inner.write().add_node(id, kind)
    }

    pub fn remove_node(&self, id: &Path) -> Result<DocumentNode, GraphError> {
        self.inner.write().remove_node(id)
    }

    pub fn add_dependency(&self, from: &Path, to: &Path) -> Result<(), GraphError> {
        self.inner.write().add_dependency(from, to)
    }

    pub fn remove_dependency(&self, from: &Path, to: &Path) {
        self.inner.write().remove_dependency(from, to);
    }

    pub fn bulk_load(&self, edges: &[(PathBuf, PathBuf)]) -> Result<(), GraphError> {
        self.inner.write().bulk_load(edges)
    }

    pub fn replace_dependencies(&self, from: &Path, deps: &[PathBuf]) -> Result<bool, GraphError> {
        self.inner.write().replace_dependencies(from, deps)
    }

    /// Set the compiled flag. Returns `false` for unknown ids.
    pub fn mark_compiled(&self, id: &Path, compiled: bool) -> bool {
        match self.inner.write().nodes.get_mut(id) {
            Some(node) => {
                node.compiled = compiled;
                true
            }
            None => false,
        }
    }

    /// Record the content fingerprint and mtime seen for a document.
    pub fn record_fingerprint(
        &self,
        id: &Path,
        fingerprint: Option<ContentHash>,
        modified: Option<SystemTime>,
    ) {
        if let Some(node) = self.inner.write().nodes.get_mut(id) {
            node.fingerprint = fingerprint;
            node.modified = modified;
        }
    }

    // --- queries -------------------------------------------------------------

    pub fn node(&self, id: &Path) -> Option<DocumentNode> {
        self.inner.read().node(id).cloned()
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.inner.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn ids(&self) -> Vec<PathBuf> {
        self.inner.read().ids()
    }

    pub fn dependencies(&self, id: &Path) -> Vec<PathBuf> {
        self.inner.read().dependencies(id)
    }

    pub fn dependents(&self, id: &Path) -> Vec<PathBuf> {
        self.inner.read().dependents(id)
    }

    pub fn transitive_dependencies(&self, id: &Path) -> Vec<PathBuf> {
        self.inner.read().transitive_dependencies(id)
    }

    pub fn transitive_dependents(&self, id: &Path) -> Vec<PathBuf> {
        self.inner.read().transitive_dependents(id)
    }

    pub fn topological_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        self.inner.read().topological_order()
    }

    pub fn compilation_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        self.inner.read().compilation_order()
    }

    pub fn compilation_order_of(
        &self,
        subset: &FxHashSet<PathBuf>,
    ) -> Result<Vec<PathBuf>, GraphError> {
        self.inner.read().compilation_order_of(subset)
    }

    pub fn has_cycle(&self) -> bool {
        self.inner.read().has_cycle()
    }

    pub fn get_cycles(&self) -> Vec<Vec<PathBuf>> {
        self.inner.read().get_cycles()
    }

    pub fn find_cycles(&self) -> Vec<Vec<PathBuf>> {
        self.inner.read().find_cycles()
    }

    pub fn shortest_path(&self, from: &Path, to: &Path) -> Option<Vec<PathBuf>> {
        self.inner.read().shortest_path(from, to)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        self.inner.read().validate()
    }
}
