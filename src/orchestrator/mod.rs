//! Build orchestrator.
//!
//! Owns the dependency graph and drives every build cycle:
//!
//! ```text
//! full build:   discover → parse imports → bulk-load edges (cycle check)
//!               → compilation order → compile each (fail-fast) → tools
//! incremental:  changes → update nodes/edges → changed + transitive
//!               dependents → compile in order → tools → reload
//! ```
//!
//! The compiler is synchronous; every call into it runs on a blocking
//! thread so the session loop stays responsive.

mod build;
mod deps;
pub mod discovery;
mod error;
mod error_state;
mod incremental;
mod session;
mod tools;


use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rustc_hash::FxHashMap;

use crate::bus::{Event, EventBus, EventType};
use crate::compiler::{CompileError, Compiler, Document};
use crate::config::ProjectConfig;
use crate::core::{BuildMode, DocumentState};
use crate::diagnostics::Diagnostics;
use crate::graph::DependencyGraph;
use crate::supervisor::ProcessSupervisor;
use crate::utils::hash::ContentHash;
use error_state::{ErrorState, Report};

pub use error::{BuildError, DiscoveryError};
pub use session::run_session;

/// Counters for one build cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub compiled: usize,
    /// Unchanged saves and documents blocked by a failed dependency
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compiled, {} skipped, {} failed in {:.2?}",
            self.compiled, self.skipped, self.failed, self.duration
        )
    }
}

pub struct Orchestrator {
    config: Arc<ProjectConfig>,
    compiler: Arc<dyn Compiler>,
    graph: DependencyGraph,
    bus: Arc<EventBus>,
    supervisor: Arc<ProcessSupervisor>,
    mode: BuildMode,
    states: FxHashMap<PathBuf, DocumentState>,
    diagnostics: Diagnostics,
    /// Importer → imports that did not resolve when it was last parsed
    dangling: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    errors: ErrorState,
    /// Registered post-processing tools, in run order
    tools: Vec<String>,
    /// Last full build succeeded; otherwise the next change retries it
    healthy: bool,
}

impl Orchestrator {
    /// Create an orchestrator and register the configured tools.
    pub fn new(
        config: Arc<ProjectConfig>,
        compiler: Arc<dyn Compiler>,
        bus: Arc<EventBus>,
        supervisor: Arc<ProcessSupervisor>,
        mode: BuildMode,
    ) -> Result<Self, BuildError> {
        let tools = tools::register_tools(&supervisor, &config, mode)?;
        let reminder = config.diagnostics.reminder();

        Ok(Self {
            config,
            compiler,
            graph: DependencyGraph::new(),
            bus,
            supervisor,
            mode,
            states: FxHashMap::default(),
            diagnostics: Diagnostics::new(),
            dangling: BTreeMap::new(),
            errors: ErrorState::new(reminder),
            tools,
            healthy: false,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn state(&self, path: &Path) -> Option<DocumentState> {
        self.states.get(path).copied()
    }

    /// Diagnostics from the most recent compile of every document.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    // -------------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------------

    /// Move a document to `next`, rejecting illegal transitions.
    fn advance(&mut self, path: &Path, next: DocumentState) {
        match self.states.get(path).copied() {
            None => {
                self.states.insert(path.to_path_buf(), next);
            }
            Some(current) => match current.advance(next) {
                Ok(state) => {
                    self.states.insert(path.to_path_buf(), state);
                }
                Err(e) => crate::debug!("state"; "{}: {}", self.config.root_relative(path), e),
            },
        }
    }

    /// Hash the file and record it on the node.
    fn fingerprint(&self, path: &Path) {
        let (hash, modified) = snapshot(path);
        self.graph.record_fingerprint(path, hash, modified);
    }

    /// Parse imports on a blocking thread.
    async fn parse_imports(&self, path: &Path) -> Result<Vec<PathBuf>, CompileError> {
        let compiler = Arc::clone(&self.compiler);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || compiler.parse_imports(&owned))
            .await
            .unwrap_or_else(|_| Err(CompileError::Panicked(path.to_path_buf())))
    }

    /// Compile one document on a blocking thread and record the outcome.
    async fn compile(&mut self, path: &Path) -> Result<(), CompileError> {
        let Some(node) = self.graph.node(path) else {
            return Ok(());
        };
        let doc = Document::new(path, node.kind).with_dependencies(node.dependencies);
        crate::debug!("compile"; "{} {}", node.kind, self.config.root_relative(path));

        // Taken before compiling: a save that lands mid-compile must still
        // look changed afterwards
        let (hash, modified) = snapshot(path);

        let compiler = Arc::clone(&self.compiler);
        let result = tokio::task::spawn_blocking(move || compiler.compile_document(&doc))
            .await
            .unwrap_or_else(|_| Err(CompileError::Panicked(path.to_path_buf())));

        self.diagnostics.clear_for(path);
        match result {
            Ok(()) => {
                self.graph.mark_compiled(path, true);
                self.graph.record_fingerprint(path, hash, modified);
                self.advance(path, DocumentState::Compiled);
                Ok(())
            }
            Err(e) => {
                self.graph.mark_compiled(path, false);
                self.advance(path, DocumentState::DependenciesResolved);
                if let Some(diagnostics) = e.diagnostics() {
                    self.diagnostics.merge(diagnostics.clone());
                }
                Err(e)
            }
        }
    }

    fn publish(&self, kind: EventType, build_scope: &str) -> bool {
        self.bus
            .publish(Event::new(kind, "orchestrator").with("scope", build_scope))
    }

    /// Show a failure unless the same one was just shown.
    fn notify_failure(&mut self, summary: &str, detail: &str) {
        match self.errors.report_error(detail) {
            Report::Show => crate::logger::status_error(summary, detail),
            Report::Reminder => {
                crate::logger::status_error(&format!("{summary} (still failing)"), detail);
            }
            Report::Suppressed => crate::debug!("build"; "suppressed repeated error: {}", summary),
        }
    }

    fn notify_success(&mut self, message: &str) {
        if self.errors.report_success() {
            crate::logger::status_success(&format!("fixed, {message}"));
        } else {
            crate::logger::status_success(message);
        }
    }
}

/// Content hash and mtime of a file as it is on disk now.
fn snapshot(path: &Path) -> (Option<ContentHash>, Option<SystemTime>) {
    let hash = ContentHash::of_file(path).ok();
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    (hash, modified)
}
