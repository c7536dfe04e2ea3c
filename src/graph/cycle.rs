//! Cycle detection.
//!
//! A well-formed graph never contains a cycle; these queries exist to
//! diagnose graphs corrupted out of band and to explain rejected edges.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use super::Graph;

impl Graph {
    pub fn has_cycle(&self) -> bool {
        self.compilation_order().is_err()
    }

    /// One cycle per DFS back edge, each closed (`[a, b, a]`).
    ///
    /// Unlike [`Graph::compilation_order`] this keeps going after the first
    /// cycle, so every back edge is reported.
    pub fn get_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut open = FxHashSet::default();
        let mut done = FxHashSet::default();
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        for id in self.nodes.keys() {
            self.collect_cycles(id, &mut open, &mut done, &mut path, &mut cycles);
        }
        cycles
    }

    /// Strongly connected components with more than one member, or with a
    /// self loop. Members sorted; components sorted by first member.
    pub fn find_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut tarjan = Tarjan::default();
        for id in self.nodes.keys() {
            if !tarjan.index.contains_key(id.as_path()) {
                tarjan.connect(self, id);
            }
        }

        let mut components: Vec<Vec<PathBuf>> = tarjan
            .components
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || self
                        .nodes
                        .get(scc[0].as_path())
                        .is_some_and(|n| n.depends_on(&scc[0]))
            })
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        components.sort();
        components
    }

    fn collect_cycles<'a>(
        &'a self,
        id: &'a Path,
        open: &mut FxHashSet<&'a Path>,
        done: &mut FxHashSet<&'a Path>,
        path: &mut Vec<&'a Path>,
        cycles: &mut Vec<Vec<PathBuf>>,
    ) {
        if done.contains(id) {
            return;
        }
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if open.contains(id) {
            if let Some(start) = path.iter().position(|p| *p == id) {
                let mut cycle: Vec<PathBuf> =
                    path[start..].iter().map(|p| p.to_path_buf()).collect();
                cycle.push(id.to_path_buf());
                cycles.push(cycle);
            }
            return;
        }

        open.insert(id);
        path.push(id);

        let mut deps: Vec<&PathBuf> = node.dependencies.iter().collect();
        deps.sort();
        for dep in deps {
            self.collect_cycles(dep, open, done, path, cycles);
        }

        path.pop();
        open.remove(id);
        done.insert(id);
    }
}

/// Tarjan's strongly connected components state.
#[derive(Default)]
struct Tarjan<'a> {
    next: usize,
    index: FxHashMap<&'a Path, usize>,
    lowlink: FxHashMap<&'a Path, usize>,
    stack: Vec<&'a Path>,
    on_stack: FxHashSet<&'a Path>,
    components: Vec<Vec<PathBuf>>,
}

impl<'a> Tarjan<'a> {
    fn connect(&mut self, graph: &'a Graph, id: &'a Path) {
        self.index.insert(id, self.next);
        self.lowlink.insert(id, self.next);
        self.next += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        if let Some(node) = graph.nodes.get(id) {
            for dep in &node.dependencies {
                let dep = dep.as_path();
                if !graph.nodes.contains_key(dep) {
                    continue;
                }
                if !self.index.contains_key(dep) {
                    self.connect(graph, dep);
                    let low = self.lowlink[id].min(self.lowlink[dep]);
                    self.lowlink.insert(id, low);
                } else if self.on_stack.contains(dep) {
                    let low = self.lowlink[id].min(self.index[dep]);
                    self.lowlink.insert(id, low);
                }
            }
        }

        if self.lowlink[id] == self.index[id] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.to_path_buf());
                if member == id {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
