//! Source document discovery.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use super::error::DiscoveryError;
use crate::config::ProjectConfig;
use crate::core::DocumentKind;
use crate::utils::path::normalize_path;

/// A source file found under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

/// Walk the component and page roots for source documents.
///
/// Results are sorted by path. Unreadable entries are returned as errors
/// alongside whatever could be read.
pub fn discover(config: &ProjectConfig) -> (Vec<DiscoveredDocument>, Vec<DiscoveryError>) {
    let build = &config.build;
    let mut seen = FxHashSet::default();
    let mut documents = Vec::new();
    let mut errors = Vec::new();

    for root in [&build.components, &build.pages] {
        for path in walk(root, &config.watch.ignore, &mut errors) {
            let path = normalize_path(&path);
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(kind) = build.kind_of(&path) {
                documents.push(DiscoveredDocument { path, kind });
            }
        }
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    (documents, errors)
}

fn walk(root: &Path, ignore: &[String], errors: &mut Vec<DiscoveryError>) -> Vec<PathBuf> {
    if !root.is_dir() {
        errors.push(DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            message: "not a directory".into(),
        });
        return Vec::new();
    }

    let ignore = ignore.to_vec();
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    let name = e.file_name().to_string_lossy();
                    !name.starts_with('.') && !ignore.iter().any(|i| *i == name)
                })
            });
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => errors.push(DiscoveryError::Unreadable {
                path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                message: e.to_string(),
            }),
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_by_root_and_extension() {
        let temp = TempDir::new().unwrap();
        let config = test_config_at(temp.path(), "");
        let pages = &config.build.pages;
        let components = &config.build.components;

        fs::create_dir_all(pages.join("blog")).unwrap();
        fs::create_dir_all(components.join("node_modules")).unwrap();
        fs::write(pages.join("home.jml"), "").unwrap();
        fs::write(pages.join("blog/post.jml"), "").unwrap();
        fs::write(pages.join("notes.md"), "").unwrap();
        fs::write(pages.join(".draft.jml"), "").unwrap();
        fs::write(components.join("layout.jml"), "").unwrap();
        fs::write(components.join("node_modules/dep.jml"), "").unwrap();

        let (docs, errors) = discover(&config);
        assert!(errors.is_empty());

        let found: Vec<_> = docs
            .iter()
            .map(|d| (d.path.strip_prefix(config.root()).unwrap().to_path_buf(), d.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                (PathBuf::from("components/layout.jml"), DocumentKind::Component),
                (PathBuf::from("pages/blog/post.jml"), DocumentKind::Page),
                (PathBuf::from("pages/home.jml"), DocumentKind::Page),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = test_config_at(temp.path(), "");
        fs::remove_dir(&config.build.components).unwrap();
        fs::write(config.build.pages.join("home.jml"), "").unwrap();

        let (docs, errors) = discover(&config);
        assert_eq!(docs.len(), 1);
        assert!(matches!(errors[0], DiscoveryError::Unreadable { .. }));
    }
}
