//! In-process triple store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use freshgraph_core::{ChangeEvent, ChangeKind, Triple, TripleFilter, TripleInput};

use crate::client::StoreError;
use crate::store::{class_pattern, ChangeFeed, TripleStore};

type Key = (String, String);

/// A [`TripleStore`] held in a `BTreeMap` keyed by `(subject_id, predicate)`.
#[derive(Default)]
pub struct MemoryTripleStore {
    triples: RwLock<BTreeMap<Key, Triple>>,
    feed: ChangeFeed,
}

impl MemoryTripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.triples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.triples.read().await.is_empty()
    }
}

fn key(subject_id: &str, predicate: &str) -> Key {
    (subject_id.to_string(), predicate.to_string())
}

#[async_trait]
impl TripleStore for MemoryTripleStore {
    async fn upsert(&self, input: TripleInput) -> Result<Triple, StoreError> {
        input.check_structure()?;
        let now = Utc::now();
        let k = key(&input.subject_id, &input.predicate);

        let triple = {
            let mut triples = self.triples.write().await;
            let triple = match triples.get(&k) {
                Some(existing) => Triple {
                    created_at: existing.created_at,
                    ..Triple::from_input(input, now)
                },
                None => Triple::from_input(input, now),
            };
            triples.insert(k, triple.clone());
            triple
        };

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
        let now = Utc::now();
        let touched = {
            let mut triples = self.triples.write().await;
            triples.get_mut(&key(subject_id, predicate)).map(|t| {
                t.updated_at = now;
                t.clone()
            })
        };

        if touched.is_some() {
            self.feed.publish(ChangeKind::Touched {
                subject_id: subject_id.to_string(),
                predicate: predicate.to_string(),
                updated_at: now,
            });
        }
        Ok(touched)
    }

    async fn delete(&self, subject_id: &str, predicate: &str) -> Result<u64, StoreError> {
        let removed = self.triples.write().await.remove(&key(subject_id, predicate));
        match removed {
            Some(triple) => {
                self.feed.publish(ChangeKind::Deleted { triple });
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_all(&self, subject_prefix: &str) -> Result<u64, StoreError> {
        let removed: Vec<Triple> = {
            let mut triples = self.triples.write().await;
            let keys: Vec<Key> = triples
                .keys()
                .filter(|(s, _)| s.starts_with(subject_prefix))
                .cloned()
                .collect();
            keys.iter().filter_map(|k| triples.remove(k)).collect()
        };

        let count = removed.len() as u64;
        for triple in removed {
            self.feed.publish(ChangeKind::Deleted { triple });
        }
        tracing::debug!(prefix = subject_prefix, count, "Deleted triples by prefix");
        Ok(count)
    }

    async fn get(&self, subject_id: &str, predicate: &str) -> Result<Option<Triple>, StoreError> {
        Ok(self
            .triples
            .read()
            .await
            .get(&key(subject_id, predicate))
            .cloned())
    }

    async fn subject_triples(&self, subject_id: &str) -> Result<Vec<Triple>, StoreError> {
        let triples = self.triples.read().await;
        Ok(triples
            .range(key(subject_id, "")..)
            .take_while(|((s, _), _)| s == subject_id)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn find_by_object(
        &self,
        predicate: &str,
        object_value: &str,
    ) -> Result<Vec<Triple>, StoreError> {
        let triples = self.triples.read().await;
        Ok(triples
            .values()
            .filter(|t| t.predicate == predicate && t.object_value == object_value)
            .cloned()
            .collect())
    }

    async fn subjects_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = class_pattern(prefix);
        let triples = self.triples.read().await;
        let subjects: BTreeSet<&String> = triples
            .keys()
            .map(|(s, _)| s)
            .filter(|s| s.starts_with(&pattern))
            .collect();
        Ok(subjects.into_iter().cloned().collect())
    }

    async fn query(&self, filter: &TripleFilter) -> Result<Vec<Triple>, StoreError> {
        let triples = self.triples.read().await;
        Ok(triples
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
