//! `[diagnostics]` and `[bus]` sections.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Seconds after which a suppressed repeat error is announced again
    pub reminder_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { reminder_secs: 30 }
    }
}

impl DiagnosticsConfig {
    pub fn reminder(&self) -> Duration {
        Duration::from_secs(self.reminder_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Event buffer capacity; events published while full are dropped
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}
