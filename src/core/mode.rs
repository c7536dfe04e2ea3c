//! Build mode: one-shot build vs. resident run session.

/// How the current process drives the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// `jml build`: one full build, then exit
    Build,
    /// `jml run`: full build, then rebuild on file changes
    Run,
}

impl BuildMode {
    /// Value exported to tools as `$JML_MODE`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Run => "run",
        }
    }
}
