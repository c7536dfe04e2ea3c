//! Document kind definitions.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of source document, inferred from the root it was discovered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Routable page (lives under the page root)
    Page,
    /// Reusable component (lives under the component root)
    Component,
}

impl DocumentKind {
    /// Infer kind from the containing root.
    ///
    /// Returns `None` when `path` is under neither root. A path under both
    /// (nested roots) resolves to the more specific, longer root.
    pub fn infer(path: &Path, pages: &Path, components: &Path) -> Option<Self> {
        let in_pages = path.starts_with(pages);
        let in_components = path.starts_with(components);
        match (in_pages, in_components) {
            (true, true) => {
                if components.components().count() > pages.components().count() {
                    Some(Self::Component)
                } else {
                    Some(Self::Page)
                }
            }
            (true, false) => Some(Self::Page),
            (false, true) => Some(Self::Component),
            (false, false) => None,
        }
    }

    /// Lowercase label used in logs, progress counters and compiler flags.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Component => "component",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_root() {
        let pages = Path::new("/site/pages");
        let components = Path::new("/site/components");

        assert_eq!(
            DocumentKind::infer(Path::new("/site/pages/home.jml"), pages, components),
            Some(DocumentKind::Page)
        );
        assert_eq!(
            DocumentKind::infer(Path::new("/site/components/ui/card.jml"), pages, components),
            Some(DocumentKind::Component)
        );
        assert_eq!(
            DocumentKind::infer(Path::new("/site/other/x.jml"), pages, components),
            None
        );
    }

    #[test]
    fn test_infer_nested_roots_prefers_longer() {
        let pages = Path::new("/site/src");
        let components = Path::new("/site/src/components");
        assert_eq!(
            DocumentKind::infer(Path::new("/site/src/components/nav.jml"), pages, components),
            Some(DocumentKind::Component)
        );
        assert_eq!(
            DocumentKind::infer(Path::new("/site/src/index.jml"), pages, components),
            Some(DocumentKind::Page)
        );
    }
}
