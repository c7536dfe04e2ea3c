use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::DocumentKind;
use crate::utils::hash::ContentHash;

/// One source document in the dependency graph.
///
/// `dependencies` is authoritative and keeps import order; `dependents` is
/// the derived inverse, kept sorted by the graph on every edge mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    /// Absolute path, the node identity
    pub id: PathBuf,
    pub kind: DocumentKind,
    pub dependencies: Vec<PathBuf>,
    pub dependents: Vec<PathBuf>,
    pub compiled: bool,
    pub modified: Option<SystemTime>,
    pub fingerprint: Option<ContentHash>,
}

impl DocumentNode {
    pub fn new(id: PathBuf, kind: DocumentKind) -> Self {
        Self {
            id,
            kind,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            compiled: false,
            modified: None,
            fingerprint: None,
        }
    }

    #[inline]
    pub fn depends_on(&self, id: &Path) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }

    pub(super) fn add_dependent(&mut self, id: &Path) {
        if let Err(pos) = self.dependents.binary_search_by(|d| d.as_path().cmp(id)) {
            self.dependents.insert(pos, id.to_path_buf());
        }
    }

    pub(super) fn remove_dependent(&mut self, id: &Path) {
        self.dependents.retain(|d| d != id);
    }

    pub(super) fn remove_dependency(&mut self, id: &Path) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|d| d != id);
        self.dependencies.len() < before
    }
}
