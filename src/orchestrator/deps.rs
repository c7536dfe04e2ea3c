//! Dependency edges for one document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::Orchestrator;
use super::error::DiscoveryError;
use crate::graph::GraphError;

/// Outcome of re-linking one document.
pub(super) struct Linked {
    /// The outgoing edge list differs from before
    pub changed: bool,
    pub unresolved: Vec<DiscoveryError>,
}

impl Orchestrator {
    /// Replace the outgoing edges of `path` with `imports`.
    ///
    /// Imports of unknown documents are skipped and remembered so a later
    /// create event can re-link the importer. The edge swap is one graph
    /// transaction; on error neither the graph nor the waiting list change.
    pub(super) fn link_imports(
        &mut self,
        path: &Path,
        imports: &[PathBuf],
    ) -> Result<Linked, GraphError> {
        let (resolved, missing): (Vec<PathBuf>, Vec<PathBuf>) = self
            .graph
            .with_read(|graph| imports.iter().cloned().partition(|i| graph.contains(i)));

        let changed = self.graph.replace_dependencies(path, &resolved)?;

        if missing.is_empty() {
            self.dangling.remove(path);
        } else {
            self.dangling
                .insert(path.to_path_buf(), missing.iter().cloned().collect::<BTreeSet<_>>());
        }

        if changed {
            crate::debug!(
                "deps"; "{}: {} edges",
                self.config.root_relative(path), resolved.len()
            );
        }
        let unresolved = missing
            .into_iter()
            .map(|import| DiscoveryError::UnresolvedImport {
                importer: path.to_path_buf(),
                import,
            })
            .collect();
        Ok(Linked { changed, unresolved })
    }

    /// Documents currently waiting on a missing import, except `path`.
    pub(super) fn waiting_importers(&self, path: &Path) -> Vec<PathBuf> {
        self.dangling
            .keys()
            .filter(|importer| importer.as_path() != path)
            .cloned()
            .collect()
    }

    pub(super) fn report_unresolved(&self, errors: &[DiscoveryError]) {
        for error in errors {
            if let DiscoveryError::UnresolvedImport { importer, import } = error {
                crate::log!(
                    "deps"; "warning: {} imports unknown document {}",
                    self.config.root_relative(importer),
                    self.config.root_relative(import)
                );
            }
        }
    }
}
