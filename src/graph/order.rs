//! Ordering: dependency-first compilation order and its reverse.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Graph, GraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path
    Open,
    /// Fully explored and emitted
    Done,
}

impl Graph {
    /// Every node, each after all of its dependencies.
    ///
    /// Depth-first post-order over nodes and dependencies visited in sorted
    /// identity order, so equal graphs always yield the same sequence.
    /// Fails with the offending cycle if the graph is not a DAG.
    pub fn compilation_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        let mut marks = FxHashMap::default();
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for id in self.nodes.keys() {
            self.visit(id, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    /// Every node, each before all of its dependencies.
    ///
    /// Linear extension of the edge direction (`from` before `to`), i.e. the
    /// exact reverse of [`Graph::compilation_order`].
    pub fn topological_order(&self) -> Result<Vec<PathBuf>, GraphError> {
        let mut order = self.compilation_order()?;
        order.reverse();
        Ok(order)
    }

    /// Compilation order restricted to `subset`, ids outside the graph dropped.
    pub fn compilation_order_of(
        &self,
        subset: &FxHashSet<PathBuf>,
    ) -> Result<Vec<PathBuf>, GraphError> {
        let mut order = self.compilation_order()?;
        order.retain(|id| subset.contains(id));
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        id: &'a Path,
        marks: &mut FxHashMap<&'a Path, Mark>,
        path: &mut Vec<&'a Path>,
        order: &mut Vec<PathBuf>,
    ) -> Result<(), GraphError> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Open) => {
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                let mut cycle: Vec<PathBuf> =
                    path[start..].iter().map(|p| p.to_path_buf()).collect();
                cycle.push(id.to_path_buf());
                return Err(GraphError::Cycle(cycle));
            }
            None => {}
        }

        marks.insert(id, Mark::Open);
        path.push(id);

        let mut deps: Vec<&PathBuf> = node.dependencies.iter().collect();
        deps.sort();
        for dep in deps {
            self.visit(dep, marks, path, order)?;
        }

        path.pop();
        marks.insert(id, Mark::Done);
        order.push(id.to_path_buf());
        Ok(())
    }
}
