//! Configuration for the reference view tiers.

use std::time::Duration;

use serde::Deserialize;

/// Loaded from the `[views]` section or `FRESHGRAPH_VIEWS__*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Delay between a committed change and its visibility in the
    /// incremental tier, measured from the change's commit time.
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,

    /// Dwell time of each delivery task phase.
    #[serde(default = "default_dispatch_dwell_secs")]
    pub dispatch_dwell_secs: u64,

    /// Rows handed to the search index per sync pass.
    #[serde(default = "default_search_batch_size")]
    pub search_batch_size: usize,

    #[serde(default = "default_search_poll_interval_ms")]
    pub search_poll_interval_ms: u64,
}

fn default_propagation_delay_ms() -> u64 {
    100
}

fn default_dispatch_dwell_secs() -> u64 {
    freshgraph_core::dispatch::DEFAULT_DWELL_SECS as u64
}

fn default_search_batch_size() -> usize {
    100
}

fn default_search_poll_interval_ms() -> u64 {
    1000
}

impl ViewConfig {
    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    pub fn dispatch_dwell(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dispatch_dwell_secs as i64)
    }

    pub fn search_poll_interval(&self) -> Duration {
        Duration::from_millis(self.search_poll_interval_ms.max(1))
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            propagation_delay_ms: default_propagation_delay_ms(),
            dispatch_dwell_secs: default_dispatch_dwell_secs(),
            search_batch_size: default_search_batch_size(),
            search_poll_interval_ms: default_search_poll_interval_ms(),
        }
    }
}
