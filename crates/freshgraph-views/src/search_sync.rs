//! Keeps a search index in step with the incremental order view.
//!
//! Each pass reads rows changed after the cursor (oldest first, bounded by the
//! batch size), upserts them into the index by id, and moves the cursor to the
//! newest `effective_updated_at` in the batch. Re-sending a document is
//! harmless, so a pass interrupted between the upsert and the cursor move only
//! repeats work.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::Result;
use crate::incremental::IncrementalView;
use crate::tier::TierRow;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchDocument {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace documents by id. Returns how many were accepted.
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<usize>;
}

/// In-process reference index.
#[derive(Default)]
pub struct MemorySearchIndex {
    documents: RwLock<BTreeMap<String, SearchDocument>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<SearchDocument> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn upsert(&self, documents: Vec<SearchDocument>) -> Result<usize> {
        let mut index = self.documents.write().await;
        let count = documents.len();
        for doc in documents {
            index.insert(doc.id.clone(), doc);
        }
        Ok(count)
    }
}

pub struct SearchSyncWorker {
    view: Arc<IncrementalView>,
    index: Arc<dyn SearchIndex>,
    batch_size: usize,
    cursor: Mutex<DateTime<Utc>>,
}

impl SearchSyncWorker {
    /// A worker starting from the Unix epoch, so the first passes send everything.
    pub fn new(view: Arc<IncrementalView>, index: Arc<dyn SearchIndex>, batch_size: usize) -> Self {
        Self {
            view,
            index,
            batch_size: batch_size.max(1),
            cursor: Mutex::new(DateTime::<Utc>::default()),
        }
    }

    pub async fn cursor(&self) -> DateTime<Utc> {
        *self.cursor.lock().await
    }

    /// Run one pass. Returns the number of documents sent.
    pub async fn sync_once(&self) -> Result<usize> {
        let mut cursor = self.cursor.lock().await;
        let rows = self.view.changed_since(*cursor, self.batch_size).await;
        if rows.is_empty() {
            tracing::debug!("No new documents to sync");
            return Ok(0);
        }

        let latest = rows.iter().filter_map(|r| r.effective_updated_at).max();
        let documents: Vec<SearchDocument> = rows.into_iter().filter_map(to_document).collect();
        let sent = self.index.upsert(documents).await?;

        if let Some(latest) = latest {
            if latest > *cursor {
                *cursor = latest;
            }
        }
        tracing::info!(sent, cursor = %*cursor, "Synced documents to search index");
        Ok(sent)
    }

    /// Sync on every tick until `shutdown` flips. A failed pass is logged
    /// and retried on the next tick.
    pub async fn run(&self, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(poll_ms = poll_interval.as_millis() as u64, "Search sync worker started");
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        tracing::error!(error = %e, "Search sync pass failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Search sync worker stopped");
    }
}

fn to_document(row: TierRow) -> Option<SearchDocument> {
    Some(SearchDocument {
        updated_at: row.effective_updated_at?,
        id: row.key,
        body: row.payload,
    })
}
