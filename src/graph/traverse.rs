//! Reachability queries.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{DocumentNode, Graph};

impl Graph {
    /// Everything `id` depends on, directly or not. Sorted, `id` excluded.
    pub fn transitive_dependencies(&self, id: &Path) -> Vec<PathBuf> {
        self.closure(id, |node| node.dependencies.as_slice())
    }

    /// Everything depending on `id`, directly or not. Sorted, `id` excluded.
    ///
    /// This is the set that must be recompiled when `id` changes.
    pub fn transitive_dependents(&self, id: &Path) -> Vec<PathBuf> {
        self.closure(id, |node| node.dependents.as_slice())
    }

    /// Shortest dependency chain from `from` to `to`, both ends included.
    ///
    /// Breadth-first along dependency edges; neighbours are expanded in sorted
    /// order so ties resolve the same way every time.
    pub fn shortest_path(&self, from: &Path, to: &Path) -> Option<Vec<PathBuf>> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_path_buf()]);
        }

        let mut parent: FxHashMap<&Path, &Path> = FxHashMap::default();
        let mut queue = VecDeque::from([from]);
        parent.insert(from, from);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            let mut deps: Vec<&Path> = node.dependencies.iter().map(PathBuf::as_path).collect();
            deps.sort();

            for dep in deps {
                if parent.contains_key(dep) {
                    continue;
                }
                parent.insert(dep, current);
                if dep == to {
                    return Some(unwind(&parent, from, to));
                }
                queue.push_back(dep);
            }
        }
        None
    }

    fn closure<'a, F>(&'a self, start: &Path, next: F) -> Vec<PathBuf>
    where
        F: Fn(&'a DocumentNode) -> &'a [PathBuf],
    {
        let mut seen: FxHashSet<&Path> = FxHashSet::default();
        let mut queue: VecDeque<&Path> = VecDeque::new();

        if let Some(node) = self.nodes.get(start) {
            queue.extend(next(node).iter().map(PathBuf::as_path));
        }
        while let Some(id) = queue.pop_front() {
            if id == start || !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                queue.extend(next(node).iter().map(PathBuf::as_path));
            }
        }

        let mut result: Vec<PathBuf> = seen.into_iter().map(Path::to_path_buf).collect();
        result.sort();
        result
    }
}

fn unwind(parent: &FxHashMap<&Path, &Path>, from: &Path, to: &Path) -> Vec<PathBuf> {
    let mut path = vec![to.to_path_buf()];
    let mut current = to;
    while current != from {
        match parent.get(current) {
            Some(&prev) => {
                current = prev;
                path.push(current.to_path_buf());
            }
            None => break,
        }
    }
    path.reverse();
    path
}
