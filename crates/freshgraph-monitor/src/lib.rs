//! freshgraph-monitor: measures how stale each view tier is for one order.
//!
//! A session runs three loops against a single subject: a heartbeat that
//! re-stamps a marker fact, a poller that reads every tier concurrently and
//! records response and reaction times, and a driver that refreshes the batch
//! tier on its own schedule.

pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod session;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use metrics::{LatencyStats, RingBuffer, Sample, TierStats};
pub use session::{BatchRefreshRecord, FreshnessMonitor, MetricsSnapshot, PerTier, Tiers};
