//! External compiler collaborator.
//!
//! The document grammar lives outside this crate. The build engine only
//! needs two capabilities from it: compile one document, and list the
//! documents it imports. [`ExternalCompiler`] provides both by invoking the
//! configured compiler executable.

pub mod ast;
mod external;
mod resolve;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::DocumentKind;
use crate::diagnostics::Diagnostics;

pub use external::ExternalCompiler;
pub use resolve::ImportResolver;

/// A document handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub kind: DocumentKind,
    /// Resolved direct dependencies, already compiled
    pub dependencies: Vec<PathBuf>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            kind,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<PathBuf>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to compile `{}`:\n{diagnostics}", .path.display())]
    Failed {
        path: PathBuf,
        diagnostics: Diagnostics,
    },

    #[error("failed to launch compiler `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("compiler returned an invalid AST for `{}`: {message}", .path.display())]
    InvalidAst { path: PathBuf, message: String },

    #[error("compiler task for `{}` panicked", .0.display())]
    Panicked(PathBuf),
}

impl CompileError {
    pub fn failed(path: impl Into<PathBuf>, diagnostics: Diagnostics) -> Self {
        Self::Failed {
            path: path.into(),
            diagnostics,
        }
    }

    /// Accumulated diagnostics, when the compiler produced any.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Failed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Failed { path, .. } | Self::InvalidAst { path, .. } | Self::Panicked(path) => {
                Some(path)
            }
            Self::Launch { .. } => None,
        }
    }
}

/// Compile and dependency-extraction capability consumed by the orchestrator.
///
/// Calls are synchronous per document; the orchestrator moves them off the
/// async runtime.
pub trait Compiler: Send + Sync {
    /// Compile a document, dispatching on its kind.
    fn compile_document(&self, doc: &Document) -> Result<(), CompileError> {
        match doc.kind {
            DocumentKind::Page => self.compile_page(doc),
            DocumentKind::Component => self.compile_component(doc),
        }
    }

    fn compile_page(&self, doc: &Document) -> Result<(), CompileError>;

    fn compile_component(&self, doc: &Document) -> Result<(), CompileError>;

    /// Absolute identities of the documents `path` imports, in source order.
    ///
    /// Identities are returned whether or not the target exists; the caller
    /// decides what an unresolved import means.
    fn parse_imports(&self, path: &Path) -> Result<Vec<PathBuf>, CompileError>;
}
