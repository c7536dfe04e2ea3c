//! `[build]` section: source roots and output.
//!
//! # Example
//!
//! ```toml
//! [build]
//! pages = "pages"
//! components = "components"
//! output = "build"
//! extensions = ["jml"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::core::DocumentKind;
use crate::utils::path::resolve_path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Page root
    pub pages: PathBuf,
    /// Component root
    pub components: PathBuf,
    /// Build output directory
    pub output: PathBuf,
    /// Source document extensions, without the dot
    pub extensions: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pages: "pages".into(),
            components: "components".into(),
            output: "build".into(),
            extensions: vec!["jml".into()],
        }
    }
}

impl BuildConfig {
    const PAGES: FieldPath = FieldPath::new("build.pages");
    const OUTPUT: FieldPath = FieldPath::new("build.output");
    const EXTENSIONS: FieldPath = FieldPath::new("build.extensions");

    pub(crate) fn normalize(&mut self, root: &Path) {
        self.pages = resolve_path(&self.pages, root);
        self.components = resolve_path(&self.components, root);
        self.output = resolve_path(&self.output, root);
        for ext in &mut self.extensions {
            *ext = ext.trim_start_matches('.').to_string();
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.extensions.is_empty() {
            diag.error(Self::EXTENSIONS, format!("{} is empty", Self::EXTENSIONS));
        }

        if !self.pages.is_dir() {
            diag.error(
                Self::PAGES,
                format!("page root not found: {}", self.pages.display()),
            );
        }

        for root in [&self.pages, &self.components] {
            if root.starts_with(&self.output) {
                diag.error_with_hint(
                    Self::OUTPUT,
                    format!("output directory contains source root {}", root.display()),
                    "move the output directory outside the page and component roots",
                );
            }
        }
    }

    /// Whether `path` has a source document extension.
    pub fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Kind of a source document, from its containing root.
    pub fn kind_of(&self, path: &Path) -> Option<DocumentKind> {
        if !self.is_source(path) {
            return None;
        }
        DocumentKind::infer(path, &self.pages, &self.components)
    }

    /// Extension appended to import specifiers written without one.
    pub fn default_extension(&self) -> &str {
        self.extensions.first().map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.pages, PathBuf::from("pages"));
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert_eq!(config.build.extensions, vec!["jml"]);
    }

    #[test]
    fn test_kind_of() {
        let mut build = BuildConfig::default();
        build.normalize(Path::new("/site"));

        assert_eq!(build.kind_of(Path::new("/site/pages/a.jml")), Some(DocumentKind::Page));
        assert_eq!(
            build.kind_of(Path::new("/site/components/b.jml")),
            Some(DocumentKind::Component)
        );
        assert_eq!(build.kind_of(Path::new("/site/pages/a.css")), None);
        assert_eq!(build.kind_of(Path::new("/site/other/a.jml")), None);
    }

    #[test]
    fn test_extension_dot_stripped() {
        let mut config = test_parse_config("[build]\nextensions = [\".jml\", \"jmx\"]");
        config.build.normalize(Path::new("/site"));
        assert_eq!(config.build.extensions, vec!["jml", "jmx"]);
        assert!(config.build.is_source(Path::new("x.jmx")));
        assert_eq!(config.build.default_extension(), "jml");
    }

    #[test]
    fn test_output_over_sources_rejected() {
        let mut build = BuildConfig {
            output: ".".into(),
            ..Default::default()
        };
        build.normalize(Path::new("/nonexistent-site"));
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert!(diag.errors().iter().any(|e| e.field == BuildConfig::OUTPUT));
        assert!(diag.errors().iter().any(|e| e.field == BuildConfig::PAGES));
    }
}
