use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::compiler::CompileError;
use crate::graph::GraphError;
use crate::supervisor::ProcessError;
use crate::watcher::WatcherError;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read `{}`: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("`{}` imports `{}`, which is not a known document", .importer.display(), .import.display())]
    UnresolvedImport { importer: PathBuf, import: PathBuf },
}

/// Everything that can end a build cycle.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error("cannot create output directory `{}`: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
