//! Session lifecycle configuration.

use serde::Deserialize;
use std::time::Duration;

/// Session-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Minutes without traffic before a session is idle and may be evicted.
    #[serde(default = "default_idle_threshold_minutes")]
    pub idle_threshold_minutes: i64,

    /// Interval between idle-session eviction runs, in seconds.
    #[serde(default = "default_eviction_interval_seconds")]
    pub eviction_interval_seconds: u64,
}

fn default_idle_threshold_minutes() -> i64 {
    30
}

fn default_eviction_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_threshold_minutes: default_idle_threshold_minutes(),
            eviction_interval_seconds: default_eviction_interval_seconds(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn idle_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.idle_threshold_minutes)
    }

    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_seconds)
    }
}
