//! The triple store contract and its change feed.

use async_trait::async_trait;
use tokio::sync::broadcast;

use freshgraph_core::{ChangeEvent, ChangeKind, Triple, TripleFilter, TripleInput};

use crate::client::StoreError;

/// Buffered events per subscriber before it starts lagging.
pub const CHANGE_FEED_CAPACITY: usize = 4096;

/// Storage of subject/predicate/object facts.
///
/// At most one live triple exists per `(subject_id, predicate)`. Writes are
/// upserts and there is no history. Every committed change is published on
/// the store's change feed.
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Insert or replace the live value for `(subject_id, predicate)`.
    ///
    /// `created_at` survives replacement; `updated_at` is set to now.
    async fn upsert(&self, input: TripleInput) -> Result<Triple, StoreError>;

    /// Independent upserts with no cross-item atomicity.
    async fn upsert_batch(&self, inputs: Vec<TripleInput>) -> Vec<Result<Triple, StoreError>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.upsert(input).await);
        }
        results
    }

    /// Re-stamp `updated_at` without changing the value.
    async fn touch(&self, subject_id: &str, predicate: &str)
        -> Result<Option<Triple>, StoreError>;

    /// Remove one triple. Returns the number of rows removed.
    async fn delete(&self, subject_id: &str, predicate: &str) -> Result<u64, StoreError>;

    /// Remove every triple whose subject id starts with `subject_prefix`.
    async fn delete_all(&self, subject_prefix: &str) -> Result<u64, StoreError>;

    async fn get(&self, subject_id: &str, predicate: &str) -> Result<Option<Triple>, StoreError>;

    /// All live triples of one subject, ordered by predicate.
    async fn subject_triples(&self, subject_id: &str) -> Result<Vec<Triple>, StoreError>;

    /// Triples with the given predicate whose object equals `object_value`.
    /// This is the reverse-link lookup for `entity_ref` values.
    async fn find_by_object(
        &self,
        predicate: &str,
        object_value: &str,
    ) -> Result<Vec<Triple>, StoreError>;

    /// Distinct subject ids of class prefix `prefix` (i.e. `prefix:*`), sorted.
    async fn subjects_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn query(&self, filter: &TripleFilter) -> Result<Vec<Triple>, StoreError>;

    /// Subscribe to committed changes from this point on.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Broadcast channel carrying [`ChangeEvent`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: ChangeKind) {
        let event = ChangeEvent::new(change);
        if self.tx.send(event).is_err() {
            tracing::trace!("Change published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(CHANGE_FEED_CAPACITY)
    }
}

/// Subject-id pattern for a class prefix.
pub(crate) fn class_pattern(prefix: &str) -> String {
    format!("{prefix}{}", freshgraph_core::types::ID_SEPARATOR)
}
