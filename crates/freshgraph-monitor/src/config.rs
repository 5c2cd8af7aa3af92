//! Configuration for the freshness monitor.

use std::time::Duration;

use serde::Deserialize;

use freshgraph_core::dispatch::ORDER_STATUS;

/// Monitor timing and sampling settings.
///
/// Loaded from the `freshgraph.toml` `[monitor]` section or
/// `FRESHGRAPH_MONITOR__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// How often every tier is read (default: 100ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the marker fact is re-stamped (default: 1s).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Batch tier refresh period. Also the assumed staleness of a batch row
    /// that carries no timestamp.
    #[serde(default = "default_batch_refresh_interval_secs")]
    pub batch_refresh_interval_secs: u64,

    /// Samples kept per tier before the oldest is evicted.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Upper bound on a single tier read.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Predicate the heartbeat touches on the monitored subject.
    #[serde(default = "default_marker_predicate")]
    pub marker_predicate: String,
}

impl MonitorConfig {
    /// Never zero. The same holds for every duration accessor below.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn batch_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.batch_refresh_interval_secs.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_heartbeat_interval_ms() -> u64 {
    1000
}

fn default_batch_refresh_interval_secs() -> u64 {
    60
}

fn default_max_samples() -> usize {
    1800
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_marker_predicate() -> String {
    ORDER_STATUS.to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            batch_refresh_interval_secs: default_batch_refresh_interval_secs(),
            max_samples: default_max_samples(),
            read_timeout_ms: default_read_timeout_ms(),
            marker_predicate: default_marker_predicate(),
        }
    }
}
