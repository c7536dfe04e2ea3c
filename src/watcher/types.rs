use std::path::PathBuf;

use crate::bus::EventType;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    pub const fn event_type(self) -> EventType {
        match self {
            Self::Created => EventType::FileCreated,
            Self::Modified => EventType::FileModified,
            Self::Removed => EventType::FileRemoved,
        }
    }
}

/// One debounced, classified change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
