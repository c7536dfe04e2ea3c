//! Full build.

use std::time::Instant;

use super::discovery::discover;
use super::{BuildError, BuildSummary, Orchestrator};
use crate::bus::EventType;
use crate::core::{BuildMode, DocumentKind, DocumentState};
use crate::diagnostics::Diagnostics;
use crate::graph::DependencyGraph;
use crate::logger::ProgressLine;

impl Orchestrator {
    /// Discover, order and compile every document, then run the tools.
    ///
    /// Fail-fast: the first compile error ends the build. Compiled flags
    /// and graph state are kept for a later retry.
    pub async fn full_build(&mut self) -> Result<BuildSummary, BuildError> {
        self.publish(EventType::BuildStarted, "full");

        let result = self.full_build_inner().await;
        self.healthy = result.is_ok();

        match &result {
            Ok(summary) => {
                self.publish(EventType::BuildCompleted, "full");
                if self.mode == BuildMode::Run {
                    self.publish(EventType::Reload, "full");
                }
                crate::debug!("build"; "{}", summary);
            }
            Err(_) => {
                self.publish(EventType::BuildFailed, "full");
            }
        }
        result
    }

    async fn full_build_inner(&mut self) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();
        self.reset();

        let output = self.config.output_dir();
        std::fs::create_dir_all(output).map_err(|source| BuildError::Output {
            path: output.to_path_buf(),
            source,
        })?;

        // Discovery
        let (documents, walk_errors) = discover(&self.config);
        for error in &walk_errors {
            crate::log!("discover"; "warning: {}", error);
        }
        for doc in &documents {
            self.graph.add_node(&doc.path, doc.kind);
            self.advance(&doc.path, DocumentState::Discovered);
            self.fingerprint(&doc.path);
        }
        crate::debug!("discover"; "{} documents", documents.len());

        // Dependency extraction
        let mut edges = Vec::new();
        for doc in &documents {
            let imports = self.parse_imports(&doc.path).await?;
            self.advance(&doc.path, DocumentState::Parsed);
            for import in imports {
                if self.graph.contains(&import) {
                    edges.push((doc.path.clone(), import));
                } else {
                    crate::log!(
                        "deps"; "warning: {} imports unknown document {}",
                        self.config.root_relative(&doc.path),
                        self.config.root_relative(&import)
                    );
                    self.dangling
                        .entry(doc.path.clone())
                        .or_default()
                        .insert(import);
                }
            }
        }

        // Self-imports and cycles fail the whole load
        self.graph.bulk_load(&edges)?;
        self.graph.validate()?;
        for doc in &documents {
            self.advance(&doc.path, DocumentState::DependenciesResolved);
        }

        // Compilation
        let order = self.graph.compilation_order()?;
        let count = |kind: DocumentKind| documents.iter().filter(|d| d.kind == kind).count();
        let progress = ProgressLine::new(&[
            ("component", count(DocumentKind::Component)),
            ("page", count(DocumentKind::Page)),
        ]);

        let mut summary = BuildSummary::default();
        for path in &order {
            let kind = self.graph.node(path).map(|n| n.kind);
            if let Err(e) = self.compile(path).await {
                drop(progress);
                return Err(e.into());
            }
            summary.compiled += 1;
            if let Some(kind) = kind {
                progress.inc(kind.label());
            }
        }
        progress.finish();

        self.run_post_tools().await?;

        summary.duration = start.elapsed();
        Ok(summary)
    }

    /// Forget everything learned by earlier builds.
    fn reset(&mut self) {
        self.graph = DependencyGraph::new();
        self.states.clear();
        self.diagnostics = Diagnostics::new();
        self.dangling.clear();
    }
}
