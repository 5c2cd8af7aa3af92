//! Tier B: a snapshot of every order row, rebuilt only on refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use freshgraph_graph::TripleStore;

use crate::error::Result;
use crate::projection::OrderProjector;
use crate::tier::{BatchRefresher, RefreshReport, Tier, TierReader, TierRow};

#[derive(Default)]
struct Snapshot {
    rows: HashMap<String, TierRow>,
    refreshed_at: Option<DateTime<Utc>>,
}

pub struct BatchCacheView {
    projector: OrderProjector,
    snapshot: RwLock<Snapshot>,
}

impl BatchCacheView {
    /// An empty view. Nothing is readable until the first [`refresh`](BatchRefresher::refresh).
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self {
            projector: OrderProjector::new(store),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().await.refreshed_at
    }
}

#[async_trait]
impl TierReader for BatchCacheView {
    fn tier(&self) -> Tier {
        Tier::Batch
    }

    async fn read(&self, key: &str) -> Result<Option<TierRow>> {
        Ok(self.snapshot.read().await.rows.get(key).cloned())
    }
}

#[async_trait]
impl BatchRefresher for BatchCacheView {
    /// Recompute every row, then swap the snapshot in one step so readers
    /// never see a half-built table.
    async fn refresh(&self) -> Result<RefreshReport> {
        let started = Instant::now();
        let mut rows = HashMap::new();
        for key in self.projector.order_keys().await? {
            if let Some(p) = self.projector.project(&key).await? {
                rows.insert(key, p.row);
            }
        }
        let count = rows.len();

        *self.snapshot.write().await = Snapshot {
            rows,
            refreshed_at: Some(Utc::now()),
        };

        let report = RefreshReport {
            rows: count,
            duration: started.elapsed(),
        };
        tracing::debug!(rows = count, duration_ms = report.duration.as_millis() as u64, "Batch view refreshed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshgraph_core::{ObjectType, TripleInput};
    use freshgraph_graph::MemoryTripleStore;

    fn status(value: &str) -> TripleInput {
        TripleInput::new("order:FM-1", "order_status", value, ObjectType::String)
    }

    #[tokio::test]
    async fn rows_change_only_on_refresh() {
        let store = Arc::new(MemoryTripleStore::new());
        let view = BatchCacheView::new(store.clone());
        store.upsert(status("CREATED")).await.unwrap();

        assert!(view.read("order:FM-1").await.unwrap().is_none());
        assert!(view.refreshed_at().await.is_none());

        let report = view.refresh().await.unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(view.read("order:FM-1").await.unwrap().unwrap().payload["order_status"], "CREATED");

        store.upsert(status("PICKING")).await.unwrap();
        assert_eq!(view.read("order:FM-1").await.unwrap().unwrap().payload["order_status"], "CREATED");

        view.refresh().await.unwrap();
        assert_eq!(view.read("order:FM-1").await.unwrap().unwrap().payload["order_status"], "PICKING");
    }

    #[tokio::test]
    async fn deleted_orders_drop_out_on_refresh() {
        let store = Arc::new(MemoryTripleStore::new());
        let view = BatchCacheView::new(store.clone());
        store.upsert(status("CREATED")).await.unwrap();
        view.refresh().await.unwrap();

        store.delete_all("order:FM-1").await.unwrap();
        assert!(view.read("order:FM-1").await.unwrap().is_some());
        assert_eq!(view.refresh().await.unwrap().rows, 0);
        assert!(view.read("order:FM-1").await.unwrap().is_none());
    }
}
