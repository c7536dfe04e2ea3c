//! Project configuration management for `jml.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # [build] [compiler] [watch] [diagnostics] [bus] [tools]
//! ├── error.rs   # ConfigError, ConfigDiagnostics
//! ├── util.rs    # config file discovery
//! └── mod.rs     # ProjectConfig (this file)
//! ```
//!
//! The loaded config is immutable for the whole session and is passed to
//! every component constructor as `Arc<ProjectConfig>`.

mod error;
pub mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use section::{
    BuildConfig, BusConfig, CompilerConfig, CssFormat, CssToolConfig, DiagnosticsConfig,
    RestartConfig, ToolConfig, ToolsConfig, WatchConfig,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cli::{Cli, Commands};
use crate::log;
use crate::utils::path::normalize_path;
use util::find_config_file;

/// Root configuration structure representing jml.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root, parent of the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

impl ProjectConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file; the project root is the
    /// config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = find_config_file(&cli.config, &cwd)
            .ok_or_else(|| ConfigError::NotFound(cwd.join(&cli.config)))?;

        let mut config = Self::from_path(&config_path)?;
        config.config_path = normalize_path(&config_path);
        let root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);

        config.apply_cli(cli);
        config.finalize(&root);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Resolve every configured path against `root`.
    ///
    /// Idempotent; tests call it directly instead of [`ProjectConfig::load`].
    pub fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.build.normalize(&root);
        self.tools.normalize(&root);
        self.root = root;
    }

    /// CLI flags override file values.
    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        if let Some(output) = &cli.output {
            self.build.output.clone_from(output);
        }
        if let Commands::Run {
            debounce: Some(ms), ..
        } = cli.command
        {
            self.watch.debounce_ms = ms;
        }
    }

    /// Validate every section, reporting all errors at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.compiler.validate(&mut diag);
        self.tools.validate(&mut diag);
        if self.bus.capacity == 0 {
            diag.error(FieldPath::new("bus.capacity"), "must be at least 1");
        }

        diag.print_hints();
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output directory (absolute after `finalize`).
    pub fn output_dir(&self) -> &Path {
        &self.build.output
    }

    /// Path relative to the project root, for log output.
    pub fn root_relative(&self, path: &Path) -> String {
        crate::utils::path::display_relative(path, &self.root)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Config rooted at `root`, with page and component roots created.
#[cfg(test)]
pub fn test_config_at(root: &Path, extra: &str) -> ProjectConfig {
    let mut config = test_parse_config(extra);
    config.finalize(root);
    fs::create_dir_all(&config.build.pages).unwrap();
    fs::create_dir_all(&config.build.components).unwrap();
    config
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(ProjectConfig::from_str("[build\npages = \"x\"").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\npages = \"src\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
        assert_eq!(config.build.pages, PathBuf::from("src"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_finalize_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "[build]\noutput = \"dist\"");
        let root = normalize_path(dir.path());

        assert_eq!(config.root(), root);
        assert_eq!(config.build.pages, root.join("pages"));
        assert_eq!(config.output_dir(), root.join("dist"));
        assert_eq!(config.root_relative(&root.join("pages/a.jml")), "pages/a.jml");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = test_parse_config("[watch]\ndebounce_ms = 100");
        let cli = Cli::parse_from(["jml", "run", "--debounce", "40", "-o", "out"]);
        config.apply_cli(&cli);
        assert_eq!(config.watch.debounce_ms, 40);
        assert_eq!(config.build.output, PathBuf::from("out"));
    }

    #[test]
    fn test_validate_reports_zero_capacity() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config_at(dir.path(), "[bus]\ncapacity = 0\n[compiler]\ncommand = [\"sh\"]");
        config.finalize(dir.path());
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("bus.capacity"));
    }
}
