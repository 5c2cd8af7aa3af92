//! Error types for the freshgraph-monitor crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("View error: {0}")]
    View(#[from] freshgraph_views::ViewError),

    #[error("Read of {tier} timed out after {timeout_ms}ms")]
    Timeout { tier: String, timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
