use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::types::{ChangeKind, FileChange};
use crate::config::ProjectConfig;

/// Decides which debounced paths are worth reporting.
pub(super) struct PathFilter {
    pages: PathBuf,
    components: PathBuf,
    output: PathBuf,
    config_path: PathBuf,
    extensions: Vec<String>,
    ignore: Vec<String>,
}

impl PathFilter {
    pub(super) fn new(config: &ProjectConfig) -> Self {
        Self {
            pages: config.build.pages.clone(),
            components: config.build.components.clone(),
            output: config.output_dir().to_path_buf(),
            config_path: config.config_path.clone(),
            extensions: config.build.extensions.clone(),
            ignore: config.watch.ignore.clone(),
        }
    }

    /// Source documents under a root, and the config file.
    pub(super) fn is_relevant(&self, path: &Path) -> bool {
        if path == self.config_path {
            return true;
        }
        if path.starts_with(&self.output) || self.is_ignored(path) {
            return false;
        }
        let in_root = path.starts_with(&self.pages) || path.starts_with(&self.components);
        in_root
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|c| {
            let segment = c.as_os_str();
            self.ignore.iter().any(|i| segment == i.as_str())
        })
    }

    /// Turn a raw batch into ordered, actionable changes.
    ///
    /// Kinds are reconciled with what is on disk: the watcher may report a
    /// creation for a file already gone, or a removal for a file an atomic
    /// save put straight back.
    pub(super) fn classify(&self, raw: FxHashMap<PathBuf, ChangeKind>) -> Vec<FileChange> {
        let mut changes: Vec<FileChange> = raw
            .into_iter()
            .filter(|(path, _)| self.is_relevant(path))
            .filter_map(|(path, kind)| {
                let exists = path.is_file();
                let kind = match kind {
                    ChangeKind::Created if !exists => {
                        crate::debug!("watch"; "discard created (gone): {}", path.display());
                        return None;
                    }
                    ChangeKind::Modified if !exists => ChangeKind::Removed,
                    ChangeKind::Removed if exists => ChangeKind::Modified,
                    kind => kind,
                };
                Some(FileChange::new(path, kind))
            })
            .collect();

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }
}
