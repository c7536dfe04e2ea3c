use std::path::PathBuf;

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Keeps the watch roots attached.
///
/// Roots missing at startup, or removed and recreated later, are attached
/// as soon as they exist.
pub(super) struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing<W: Watcher>(&mut self, watcher: &mut W) -> notify::Result<()> {
        for path in &self.desired {
            if !path.exists() {
                crate::debug!("watch"; "root missing, will attach later: {}", path.display());
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    pub(super) fn maintain<W: Watcher>(&mut self, watcher: &mut W) {
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }

    pub(super) fn attached_count(&self) -> usize {
        self.attached.len()
    }
}
