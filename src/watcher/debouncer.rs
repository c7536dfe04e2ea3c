use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use rustc_hash::FxHashMap;

use super::types::ChangeKind;
use crate::utils::path::normalize_path;

/// Pure debouncer: timing and per-path coalescing only.
pub(super) struct Debouncer {
    window: Duration,
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Add a notify event.
    ///
    /// Renames become a removal of the old path and a creation of the new
    /// one. Metadata-only modifications (mtime, chmod) are ignored.
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        match event.kind {
            EventKind::Create(_) => self.add_paths(&event.paths, ChangeKind::Created),
            EventKind::Remove(_) => self.add_paths(&event.paths, ChangeKind::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
                (RenameMode::Both, [from, to]) => {
                    self.add(from, ChangeKind::Removed);
                    self.add(to, ChangeKind::Created);
                }
                (RenameMode::From, paths) => self.add_paths(paths, ChangeKind::Removed),
                (RenameMode::To, paths) => self.add_paths(paths, ChangeKind::Created),
                // Direction unknown: existence decides when the batch is classified
                (_, paths) => self.add_paths(paths, ChangeKind::Modified),
            },
            EventKind::Modify(_) => self.add_paths(&event.paths, ChangeKind::Modified),
            _ => {}
        }
    }

    fn add_paths(&mut self, paths: &[PathBuf], kind: ChangeKind) {
        for path in paths {
            self.add(path, kind);
        }
    }

    /// Record one change, applying the coalescing rules:
    /// - Removed → Created/Modified: restored, keep the new event
    /// - Modified → Removed: deleted, upgrade to Removed
    /// - Created → Removed: appeared then vanished, discard
    /// - otherwise the first event wins
    pub(super) fn add(&mut self, path: &Path, kind: ChangeKind) {
        if is_temp_file(path) {
            return;
        }
        let path = normalize_path(path);

        if let Some(&existing) = self.changes.get(&path) {
            match (existing, kind) {
                (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                    crate::debug!("watch"; "restore {}->{}: {}", existing.label(), kind.label(), path.display());
                    self.changes.insert(path, kind);
                }
                (ChangeKind::Modified, ChangeKind::Removed) => {
                    crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                    self.changes.insert(path, ChangeKind::Removed);
                }
                (ChangeKind::Created, ChangeKind::Removed) => {
                    crate::debug!("watch"; "discard created+removed: {}", path.display());
                    self.changes.remove(&path);
                }
                _ => return,
            }
            self.last_event = Some(Instant::now());
            return;
        }

        crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
        self.changes.insert(path, kind);
        self.last_event = Some(Instant::now());
    }

    /// Take the pending changes once the window has passed quietly.
    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let changes = std::mem::take(&mut self.changes);
        (!changes.is_empty()).then_some(changes)
    }

    pub(super) fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.window && !self.changes.is_empty())
    }

    /// Sleep until the next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        self.window
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Editor temp and backup files.
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
