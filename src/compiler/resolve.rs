//! Import specifier resolution.

use std::path::{Path, PathBuf};

use crate::utils::path::normalize_path;

/// Maps an import specifier to the absolute identity of the imported document.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    components: PathBuf,
    /// Appended when the specifier has no extension
    extension: String,
}

impl ImportResolver {
    pub fn new(components: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            components: components.into(),
            extension: extension.into(),
        }
    }

    /// Resolve `specifier` as imported from `importer`.
    ///
    /// Tried in order: relative to the importer's directory, then under the
    /// component root. When neither exists the importer-relative candidate is
    /// returned so a later create event can satisfy it.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> PathBuf {
        let spec = self.with_extension(specifier);
        let base = importer.parent().unwrap_or(Path::new("/"));

        let relative = normalize_path(&base.join(&spec));
        if relative.is_file() {
            return relative;
        }

        let bare = spec.trim_start_matches("./");
        if !bare.starts_with("../") && !Path::new(bare).is_absolute() {
            let component = normalize_path(&self.components.join(bare));
            if component.is_file() {
                return component;
            }
        }

        relative
    }

    fn with_extension(&self, specifier: &str) -> String {
        if Path::new(specifier).extension().is_some() || self.extension.is_empty() {
            specifier.to_string()
        } else {
            format!("{specifier}.{}", self.extension)
        }
    }
}
