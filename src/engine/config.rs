//! Background loop configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default heartbeat in milliseconds
pub const DEFAULT_HEARTBEAT_MS: u64 = 500;

/// Name and heartbeat of a background loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Loop name, also used as the worker thread name
    pub name: String,
    /// Maximum interval between ticks when idle
    pub heartbeat_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
        }
    }
}

impl LoopConfig {
    /// Create config with name and heartbeat
    pub fn new(name: impl Into<String>, heartbeat: Duration) -> Self {
        Self::default().with_name(name).with_heartbeat(heartbeat)
    }

    /// Set the loop name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the heartbeat
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat_ms = heartbeat.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Heartbeat as a duration; never zero
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }
}
