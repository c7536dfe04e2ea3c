//! Incremental rebuilds driven by file changes.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rustc_hash::FxHashSet;

use super::{BuildError, BuildSummary, Orchestrator};
use crate::bus::EventType;
use crate::core::DocumentState;
use crate::watcher::{ChangeKind, FileChange};

/// Work collected while applying one batch of changes.
#[derive(Default)]
struct Batch {
    /// Documents whose own content or edges changed
    dirty: FxHashSet<PathBuf>,
    /// Documents that failed; their dependents are not compiled
    failed: FxHashSet<PathBuf>,
    errors: Vec<BuildError>,
    skipped: usize,
}

impl Batch {
    fn fail(&mut self, path: &Path, error: impl Into<BuildError>) {
        self.failed.insert(path.to_path_buf());
        self.errors.push(error.into());
    }
}

impl Orchestrator {
    /// Apply one debounced batch and rebuild what it affects.
    ///
    /// Errors never escape: they are reported through the de-duplicating
    /// error state and the session keeps waiting for the next fix.
    /// Returns `None` when nothing needed building.
    pub async fn handle_changes(&mut self, changes: Vec<FileChange>) -> Option<BuildSummary> {
        let (config_changes, mut changes): (Vec<_>, Vec<_>) = changes
            .into_iter()
            .partition(|c| c.path == self.config.config_path);
        if !config_changes.is_empty() {
            crate::logger::status_warning("jml.toml changed, restart `jml run` to apply it");
        }
        if changes.is_empty() {
            return None;
        }

        if !self.healthy {
            return self.retry_full_build().await;
        }

        let start = Instant::now();
        self.publish(EventType::BuildStarted, "incremental");

        // Removals first so a rename's new path can take over its importers
        changes.sort_by_key(|c| match c.kind {
            ChangeKind::Removed => 0,
            ChangeKind::Created => 1,
            ChangeKind::Modified => 2,
        });

        let mut batch = Batch::default();
        for change in &changes {
            match change.kind {
                ChangeKind::Removed => self.on_removed(&change.path, &mut batch),
                ChangeKind::Created => self.on_created(&change.path, &mut batch).await,
                ChangeKind::Modified if self.graph.contains(&change.path) => {
                    self.on_modified(&change.path, &mut batch).await;
                }
                // Editors that write-then-rename report untracked files as modified
                ChangeKind::Modified => self.on_created(&change.path, &mut batch).await,
            }
        }

        if batch.dirty.is_empty() && batch.errors.is_empty() {
            let names: Vec<_> = changes
                .iter()
                .map(|c| self.config.root_relative(&c.path))
                .collect();
            crate::logger::status_unchanged(&format!("unchanged: {}", names.join(", ")));
            return None;
        }

        let mut summary = self.rebuild_affected(&mut batch).await;
        summary.skipped += batch.skipped;
        summary.failed = batch.errors.len();

        if batch.errors.is_empty()
            && let Err(e) = self.run_post_tools().await
        {
            batch.errors.push(e.into());
        }
        summary.duration = start.elapsed();

        if batch.errors.is_empty() {
            self.publish(EventType::BuildCompleted, "incremental");
            self.publish(EventType::Reload, "incremental");
            self.notify_success(&format!("rebuilt: {summary}"));
        } else {
            self.publish(EventType::BuildFailed, "incremental");
            let detail = batch
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            let count = batch.errors.len();
            let headline = if count == 1 {
                "build failed".to_string()
            } else {
                format!("build failed ({count} errors)")
            };
            self.notify_failure(&headline, &detail);
        }
        Some(summary)
    }

    /// The last full build failed, so the graph may be incomplete: start over.
    async fn retry_full_build(&mut self) -> Option<BuildSummary> {
        crate::debug!("build"; "retrying full build after change");
        match self.full_build().await {
            Ok(summary) => {
                self.notify_success(&format!("built: {summary}"));
                Some(summary)
            }
            Err(e) => {
                self.notify_failure("build failed", &e.to_string());
                None
            }
        }
    }

    /// Compile dirty documents and their transitive dependents in order.
    ///
    /// A document whose dependency failed is skipped rather than compiled
    /// against stale output.
    async fn rebuild_affected(&mut self, batch: &mut Batch) -> BuildSummary {
        let mut affected = FxHashSet::default();
        for path in batch.dirty.iter().chain(batch.failed.iter()) {
            if self.graph.contains(path) {
                affected.insert(path.clone());
                affected.extend(self.graph.transitive_dependents(path));
            }
        }

        let order = match self.graph.compilation_order_of(&affected) {
            Ok(order) => order,
            Err(e) => {
                batch.errors.push(e.into());
                return BuildSummary::default();
            }
        };
        crate::debug!("build"; "{} affected documents", order.len());

        let mut summary = BuildSummary::default();
        for path in &order {
            if batch.failed.contains(path) {
                continue;
            }
            let blocked = self
                .graph
                .dependencies(path)
                .iter()
                .any(|dep| batch.failed.contains(dep));
            if blocked {
                batch.failed.insert(path.clone());
                batch.skipped += 1;
                continue;
            }

            if self.state(path) == Some(DocumentState::Compiled) {
                self.advance(path, DocumentState::DependenciesResolved);
            }
            match self.compile(path).await {
                Ok(()) => summary.compiled += 1,
                Err(e) => batch.fail(path, e),
            }
        }
        summary
    }

    fn on_removed(&mut self, path: &Path, batch: &mut Batch) {
        let Ok(node) = self.graph.remove_node(path) else {
            crate::debug!("watch"; "ignore untracked removal: {}", path.display());
            return;
        };
        crate::debug!("watch"; "removed {}", self.config.root_relative(path));

        // Former importers now hold a dangling import; re-link on re-create
        for dependent in &node.dependents {
            self.dangling
                .entry(dependent.clone())
                .or_default()
                .insert(path.to_path_buf());
            batch.dirty.insert(dependent.clone());
        }
        self.dangling.remove(path);

        self.advance(path, DocumentState::Removed);
        self.states.remove(path);
        self.diagnostics.clear_for(path);
        batch.dirty.remove(path);
        batch.failed.remove(path);
    }

    async fn on_created(&mut self, path: &Path, batch: &mut Batch) {
        let Some(kind) = self.config.build.kind_of(path) else {
            return;
        };
        crate::debug!("watch"; "created {}", self.config.root_relative(path));

        self.graph.add_node(path, kind);
        self.advance(path, DocumentState::Discovered);
        self.fingerprint(path);
        self.reparse(path, batch).await;

        // A missing import may resolve to this file under any name the
        // resolver tries, so every waiting importer is parsed again
        for importer in self.waiting_importers(path) {
            if self.graph.contains(&importer) {
                self.relink(&importer, batch).await;
            } else {
                self.dangling.remove(&importer);
            }
        }
    }

    /// Re-resolve the imports of an unchanged document.
    ///
    /// Only marked dirty when its edges actually changed.
    async fn relink(&mut self, importer: &Path, batch: &mut Batch) {
        let imports = match self.parse_imports(importer).await {
            Ok(imports) => imports,
            Err(e) => {
                batch.fail(importer, e);
                return;
            }
        };
        match self.link_imports(importer, &imports) {
            Ok(linked) if linked.changed => {
                crate::debug!("deps"; "re-linked {}", self.config.root_relative(importer));
                batch.dirty.insert(importer.to_path_buf());
            }
            Ok(_) => {}
            Err(e) => batch.fail(importer, e),
        }
    }

    async fn on_modified(&mut self, path: &Path, batch: &mut Batch) {
        let previous = self.graph.node(path);
        let current = crate::utils::hash::ContentHash::of_file(path).ok();

        if let Some(node) = previous
            && node.compiled
            && current.is_some()
            && node.fingerprint == current
        {
            crate::debug!("watch"; "skip no-op save: {}", self.config.root_relative(path));
            batch.skipped += 1;
            return;
        }

        // Stale until recompiled; the compile records the new fingerprint
        self.graph.mark_compiled(path, false);
        self.reparse(path, batch).await;
    }

    /// Re-extract imports and update the edges of `path`.
    async fn reparse(&mut self, path: &Path, batch: &mut Batch) {
        let imports = match self.parse_imports(path).await {
            Ok(imports) => imports,
            Err(e) => {
                batch.fail(path, e);
                return;
            }
        };
        self.advance(path, DocumentState::Parsed);

        match self.link_imports(path, &imports) {
            Ok(linked) => {
                self.report_unresolved(&linked.unresolved);
                self.advance(path, DocumentState::DependenciesResolved);
                batch.dirty.insert(path.to_path_buf());
            }
            Err(e) => batch.fail(path, e),
        }
    }
}
