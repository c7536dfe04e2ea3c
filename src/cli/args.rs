//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::BuildMode;

/// jml incremental build engine
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Output directory path (relative to project root)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Config file path (default: jml.toml)
    #[arg(short = 'C', long, global = true, default_value = "jml.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every document once
    #[command(visible_alias = "b")]
    Build,

    /// Build, then rebuild incrementally on every change until Ctrl+C
    #[command(visible_alias = "r")]
    Run {
        /// Debounce window in milliseconds (overrides `watch.debounce_ms`)
        #[arg(short, long)]
        debounce: Option<u64>,
    },
}

impl Cli {
    pub const fn mode(&self) -> BuildMode {
        match self.command {
            Commands::Build => BuildMode::Build,
            Commands::Run { .. } => BuildMode::Run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::parse_from(["jml", "build", "-o", "dist"]);
        assert!(matches!(cli.command, Commands::Build));
        assert_eq!(cli.output, Some(PathBuf::from("dist")));
        assert_eq!(cli.config, PathBuf::from("jml.toml"));
        assert_eq!(cli.mode(), BuildMode::Build);
    }

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::parse_from(["jml", "run", "--debounce", "250", "-v", "-C", "site/jml.toml"]);
        assert!(matches!(cli.command, Commands::Run { debounce: Some(250) }));
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("site/jml.toml"));
        assert_eq!(cli.mode(), BuildMode::Run);
    }
}
