//! `[tools]` section: post-processing tools run after each build cycle.
//!
//! # Example
//!
//! ```toml
//! [tools.typecheck]
//! command = ["tsc", "--noEmit", "-p", "$JML_OUTPUT_DIR"]
//! restart = { enable = true, delay_ms = 500, max = 2 }
//!
//! # CSS generator (syntax sugar for a tool)
//! [tools.css]
//! enable = true
//! path = "styles/main.css"
//! command = ["tailwindcss"]
//! # Automatically expands to:
//! #   command = ["tailwindcss", "-i", "<path>", "-o", "$JML_OUTPUT_DIR/styles.css"]
//!
//! [[tools.post]]
//! name = "sitemap"
//! command = ["./scripts/sitemap.sh", "$JML_OUTPUT_DIR"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::utils::path::resolve_path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Type-check pass
    pub typecheck: ToolConfig,
    /// CSS generation pass
    pub css: CssToolConfig,
    /// Further tools, run in order after the two above
    pub post: Vec<ToolConfig>,
}

impl ToolsConfig {
    pub(crate) fn normalize(&mut self, root: &Path) {
        if let Some(path) = self.css.path.take() {
            self.css.path = Some(resolve_path(&path, root));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.typecheck.is_active() {
            super::check_command(
                FieldPath::new("tools.typecheck.command"),
                &self.typecheck.command,
                diag,
            );
        }
        for tool in self.post.iter().filter(|t| t.is_active()) {
            super::check_command(FieldPath::new("tools.post.command"), &tool.command, diag);
        }
        self.css.validate(diag);
    }
}

/// One external batch tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub enable: bool,
    /// Display name for logging (defaults to command[0])
    pub name: Option<String>,
    /// Command and arguments; `$JML_*` variables are substituted
    pub command: Vec<String>,
    /// Suppress output lines
    pub quiet: bool,
    pub restart: RestartConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enable: true,
            name: None,
            command: Vec::new(),
            quiet: false,
            restart: RestartConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Enabled and has something to run.
    pub fn is_active(&self) -> bool {
        self.enable && !self.command.is_empty()
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.command.first().map_or("tool", String::as_str))
    }
}

/// Restart policy for a failing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub enable: bool,
    pub delay_ms: u64,
    /// Restarts allowed before the tool is marked failed
    pub max: u32,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enable: false,
            delay_ms: 500,
            max: 2,
        }
    }
}

impl RestartConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// ============================================================================
// CSS Generator
// ============================================================================

/// CSS generator format (determines CLI arguments).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssFormat {
    /// Auto-detect from command (default).
    #[default]
    Auto,
    /// Tailwind CSS: `-i input -o output [--minify]`
    Tailwind,
    /// UnoCSS: `[scan...] -o output [--minify]`
    Uno,
}

impl CssFormat {
    pub fn infer_from_command(command: &[String]) -> Self {
        let cmd_str = command.join(" ").to_lowercase();
        if cmd_str.contains("uno") {
            Self::Uno
        } else {
            Self::Tailwind
        }
    }

    /// Resolve auto to concrete format.
    pub fn resolve(self, command: &[String]) -> Self {
        match self {
            Self::Auto => Self::infer_from_command(command),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CssToolConfig {
    pub enable: bool,
    pub command: Vec<String>,
    pub format: CssFormat,
    /// Tailwind input stylesheet
    pub path: Option<PathBuf>,
    /// Generated stylesheet, relative to the output directory
    pub output: PathBuf,
    /// UnoCSS scan patterns
    pub scan: Vec<String>,
    /// Pass `--minify` in build mode
    pub minify: bool,
    pub quiet: bool,
    pub restart: RestartConfig,
}

impl Default for CssToolConfig {
    fn default() -> Self {
        Self {
            enable: false,
            command: vec!["tailwindcss".into()],
            format: CssFormat::Auto,
            path: None,
            output: "styles.css".into(),
            scan: Vec::new(),
            minify: true,
            quiet: true,
            restart: RestartConfig::default(),
        }
    }
}

impl CssToolConfig {
    const COMMAND: FieldPath = FieldPath::new("tools.css.command");
    const PATH: FieldPath = FieldPath::new("tools.css.path");

    pub fn resolved_format(&self) -> CssFormat {
        self.format.resolve(&self.command)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.enable {
            return;
        }
        super::check_command(Self::COMMAND, &self.command, diag);

        if self.resolved_format() != CssFormat::Tailwind {
            return;
        }
        match &self.path {
            None => diag.error(
                Self::PATH,
                format!("tailwind needs an input stylesheet in {}", Self::PATH),
            ),
            Some(path) if !path.is_file() => diag.error(
                Self::PATH,
                format!("{} file not found: {}", Self::PATH, path.display()),
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert!(!config.tools.typecheck.is_active());
        assert!(!config.tools.css.enable);
        assert_eq!(config.tools.css.command, vec!["tailwindcss"]);
        assert_eq!(config.tools.css.resolved_format(), CssFormat::Tailwind);
        assert!(config.tools.post.is_empty());
    }

    #[test]
    fn test_typecheck_with_restart() {
        let config = test_parse_config(
            r#"
[tools.typecheck]
command = ["tsc", "--noEmit"]
restart = { enable = true, delay_ms = 50, max = 3 }
"#,
        );
        let tool = &config.tools.typecheck;
        assert!(tool.is_active());
        assert_eq!(tool.display_name(), "tsc");
        assert_eq!(
            tool.restart,
            RestartConfig {
                enable: true,
                delay_ms: 50,
                max: 3
            }
        );
    }

    #[test]
    fn test_post_tools() {
        let config = test_parse_config(
            r#"
[[tools.post]]
name = "sitemap"
command = ["sh", "gen.sh"]

[[tools.post]]
enable = false
command = ["echo"]
"#,
        );
        assert_eq!(config.tools.post.len(), 2);
        assert_eq!(config.tools.post[0].display_name(), "sitemap");
        assert!(!config.tools.post[1].is_active());
    }

    #[test]
    fn test_css_format_inference() {
        let uno = vec!["npx".to_string(), "unocss".to_string()];
        assert_eq!(CssFormat::Auto.resolve(&uno), CssFormat::Uno);
        assert_eq!(CssFormat::Tailwind.resolve(&uno), CssFormat::Tailwind);
        assert_eq!(
            CssFormat::infer_from_command(&["tailwindcss".to_string()]),
            CssFormat::Tailwind
        );
    }

    #[test]
    fn test_tailwind_requires_path() {
        let config = test_parse_config("[tools.css]\nenable = true\ncommand = [\"sh\"]");
        let mut diag = ConfigDiagnostics::new();
        config.tools.css.validate(&mut diag);
        assert!(diag.errors().iter().any(|e| e.field == CssToolConfig::PATH));
    }
}
