//! Bus event definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde_json::Value;

/// Event type tag; subscriptions are per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    FileCreated,
    FileModified,
    FileRemoved,
    BuildStarted,
    BuildCompleted,
    BuildFailed,
    ProcessStarted,
    ProcessExited,
    ProcessRestarting,
    ProcessFailed,
    Reload,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileCreated => "file.created",
            Self::FileModified => "file.modified",
            Self::FileRemoved => "file.removed",
            Self::BuildStarted => "build.started",
            Self::BuildCompleted => "build.completed",
            Self::BuildFailed => "build.failed",
            Self::ProcessStarted => "process.started",
            Self::ProcessExited => "process.exited",
            Self::ProcessRestarting => "process.restarting",
            Self::ProcessFailed => "process.failed",
            Self::Reload => "reload",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable once published; handlers share it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: u64,
    pub kind: EventType,
    pub timestamp: SystemTime,
    /// Publishing component, e.g. `watcher`
    pub source: String,
    pub payload: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(kind: EventType, source: impl Into<String>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            timestamp: SystemTime::now(),
            source: source.into(),
            payload: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_path(self, path: &Path) -> Self {
        self.with("path", path.display().to_string())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Event::new(EventType::Reload, "test");
        let b = Event::new(EventType::Reload, "test");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_payload() {
        let event = Event::new(EventType::FileModified, "watcher")
            .with_path(Path::new("/site/pages/a.jml"))
            .with("count", 3);
        assert_eq!(event.get_str("path"), Some("/site/pages/a.jml"));
        assert_eq!(event.get("count"), Some(&Value::from(3)));
        assert_eq!(event.kind.to_string(), "file.modified");
    }
}
