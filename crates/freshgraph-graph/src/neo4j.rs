//! [`TripleStore`] backed by Neo4j.

use async_trait::async_trait;
use tokio::sync::broadcast;

use freshgraph_core::{ChangeEvent, ChangeKind, Triple, TripleFilter, TripleInput};

use crate::client::{GraphClient, StoreError};
use crate::store::{class_pattern, ChangeFeed, TripleStore};

/// Triple store over a shared [`GraphClient`].
///
/// The change feed is process-local: only writes made through this handle
/// (or its clones) are published.
#[derive(Clone)]
pub struct Neo4jTripleStore {
    client: GraphClient,
    feed: ChangeFeed,
}

impl Neo4jTripleStore {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            feed: ChangeFeed::default(),
        }
    }

    /// Wrap the client and make sure the triple constraint exists.
    pub async fn connect(client: GraphClient) -> Result<Self, StoreError> {
        client.ensure_triple_schema().await?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    fn publish_deleted(&self, removed: Vec<Triple>) -> u64 {
        let count = removed.len() as u64;
        for triple in removed {
            self.feed.publish(ChangeKind::Deleted { triple });
        }
        count
    }
}

#[async_trait]
impl TripleStore for Neo4jTripleStore {
    async fn upsert(&self, input: TripleInput) -> Result<Triple, StoreError> {
        input.check_structure()?;
        let triple = self.client.merge_triple(&input).await?;
        self.feed.publish(ChangeKind::Upserted {
            triple: triple.clone(),
        });
        Ok(triple)
    }

    async fn touch(
        &self,
        subject_id: &str,
        predicate: &str,
    ) -> Result<Option<Triple>, StoreError> {
        let touched = self.client.touch_triple(subject_id, predicate).await?;
        if let Some(t) = &touched {
            self.feed.publish(ChangeKind::Touched {
                subject_id: t.subject_id.clone(),
                predicate: t.predicate.clone(),
                updated_at: t.updated_at,
            });
        }
        Ok(touched)
    }

    async fn delete(&self, subject_id: &str, predicate: &str) -> Result<u64, StoreError> {
        let removed = self.client.delete_triple(subject_id, predicate).await?;
        Ok(self.publish_deleted(removed))
    }

    async fn delete_all(&self, subject_prefix: &str) -> Result<u64, StoreError> {
        let removed = self
            .client
            .delete_triples_with_prefix(subject_prefix)
            .await?;
        let count = self.publish_deleted(removed);
        tracing::debug!(prefix = subject_prefix, count, "Deleted triples by prefix");
        Ok(count)
    }

    async fn get(&self, subject_id: &str, predicate: &str) -> Result<Option<Triple>, StoreError> {
        self.client.get_triple(subject_id, predicate).await
    }

    async fn subject_triples(&self, subject_id: &str) -> Result<Vec<Triple>, StoreError> {
        self.client.subject_triples(subject_id).await
    }

    async fn find_by_object(
        &self,
        predicate: &str,
        object_value: &str,
    ) -> Result<Vec<Triple>, StoreError> {
        self.client.triples_by_object(predicate, object_value).await
    }

    async fn subjects_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.client
            .subjects_starting_with(&class_pattern(prefix))
            .await
    }

    async fn query(&self, filter: &TripleFilter) -> Result<Vec<Triple>, StoreError> {
        self.client.filter_triples(filter).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
