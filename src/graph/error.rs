use std::path::{Path, PathBuf};

use thiserror::Error;

/// Dependency graph errors.
///
/// Every mutation that returns one of these has left the graph unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown document `{}`", .0.display())]
    UnknownNode(PathBuf),

    #[error("document `{}` cannot depend on itself", .0.display())]
    SelfDependency(PathBuf),

    #[error(
        "adding `{}` -> `{}` would create a cycle: {}",
        .from.display(),
        .to.display(),
        format_cycle(.cycle)
    )]
    WouldCycle {
        from: PathBuf,
        to: PathBuf,
        cycle: Vec<PathBuf>,
    },

    #[error("dependency cycle detected: {}", format_cycle(.0))]
    Cycle(Vec<PathBuf>),

    #[error("edge `{}` -> `{}` references an unknown document", .from.display(), .to.display())]
    DanglingEdge { from: PathBuf, to: PathBuf },

    #[error("edge `{}` -> `{}` is missing its inverse", .from.display(), .to.display())]
    InconsistentEdge { from: PathBuf, to: PathBuf },
}

/// `a.jml -> b.jml -> a.jml`, using file names only.
pub fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| short_name(p))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
