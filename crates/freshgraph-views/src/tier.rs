//! The contract every materialization tier satisfies.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    OnDemand,
    Batch,
    Incremental,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::OnDemand, Tier::Batch, Tier::Incremental];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnDemand => "on_demand",
            Self::Batch => "batch",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One derived row as served by a tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierRow {
    pub key: String,
    /// Latest `updated_at` among the facts the row was computed from.
    pub effective_updated_at: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

/// Read access to one tier.
#[async_trait]
pub trait TierReader: Send + Sync {
    fn tier(&self) -> Tier;

    /// The current row for `key`, or `None` if the tier has no such row.
    async fn read(&self, key: &str) -> Result<Option<TierRow>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefreshReport {
    pub rows: usize,
    pub duration: Duration,
}

/// A tier that only changes when explicitly refreshed.
#[async_trait]
pub trait BatchRefresher: Send + Sync {
    async fn refresh(&self) -> Result<RefreshReport>;
}
