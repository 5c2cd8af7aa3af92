//! Tier C: order rows maintained from the store's change feed.
//!
//! A background task applies each change once its propagation delay has
//! elapsed (measured from the change's commit time) by re-projecting only the
//! orders the change can affect. Affected orders are found from the event
//! itself (an order subject, or a `line_of_order` / `task_of_order` link) and
//! from a reverse index of which subjects each row was computed from.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

use freshgraph_core::ChangeEvent;
use freshgraph_graph::TripleStore;

use crate::error::Result;
use crate::projection::{direct_order, OrderProjector, Projection};
use crate::tier::{Tier, TierReader, TierRow};

#[derive(Default)]
struct Materialized {
    rows: HashMap<String, TierRow>,
    /// order key -> subjects its row was computed from
    sources: HashMap<String, BTreeSet<String>>,
    /// subject -> order keys whose rows read it
    readers: HashMap<String, BTreeSet<String>>,
}

impl Materialized {
    fn install(&mut self, key: &str, projection: Option<Projection>) {
        if let Some(old) = self.sources.remove(key) {
            for subject in old {
                if let Some(keys) = self.readers.get_mut(&subject) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.readers.remove(&subject);
                    }
                }
            }
        }

        match projection {
            Some(p) => {
                for subject in &p.contributors {
                    self.readers
                        .entry(subject.clone())
                        .or_default()
                        .insert(key.to_string());
                }
                self.sources.insert(key.to_string(), p.contributors);
                self.rows.insert(key.to_string(), p.row);
            }
            None => {
                self.rows.remove(key);
            }
        }
    }

    fn dependents(&self, subject: &str) -> BTreeSet<String> {
        self.readers.get(subject).cloned().unwrap_or_default()
    }
}

struct Shared {
    projector: OrderProjector,
    state: RwLock<Materialized>,
    delay: chrono::Duration,
}

impl Shared {
    /// Re-project every order the event can affect. A key that fails to
    /// project keeps its previous row and the remaining keys still apply.
    /// Returns the number of keys refreshed.
    async fn apply(&self, event: &ChangeEvent) -> usize {
        let mut keys = self.state.read().await.dependents(event.subject_id());
        if let Some(key) = direct_order(event) {
            keys.insert(key);
        }

        let mut applied = 0;
        for key in &keys {
            match self.projector.project(key).await {
                Ok(projection) => {
                    self.state.write().await.install(key, projection);
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(subject = event.subject_id(), order = %key, error = %e, "Failed to re-project order");
                }
            }
        }
        tracing::trace!(subject = event.subject_id(), affected = keys.len(), applied, "Change applied");
        applied
    }

    async fn resync(&self) -> Result<usize> {
        let mut fresh = Materialized::default();
        for key in self.projector.order_keys().await? {
            let projection = self.projector.project(&key).await?;
            fresh.install(&key, projection);
        }
        let count = fresh.rows.len();
        *self.state.write().await = fresh;
        Ok(count)
    }
}

pub struct IncrementalView {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IncrementalView {
    /// Subscribe to the store's change feed, load every current row, and
    /// start maintenance in the background.
    pub async fn spawn(store: Arc<dyn TripleStore>, delay: Duration) -> Result<Self> {
        // Subscribe before hydrating so no change between the two is lost.
        let rx = store.subscribe();
        let shared = Arc::new(Shared {
            projector: OrderProjector::new(store),
            state: RwLock::new(Materialized::default()),
            delay: chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero()),
        });
        let rows = shared.resync().await?;
        tracing::info!(rows, delay_ms = delay.as_millis() as u64, "Incremental view hydrated");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(maintain(shared.clone(), rx, shutdown_rx));

        Ok(Self {
            shared,
            shutdown,
            task: Mutex::new(Some(handle)),
        })
    }

    /// Rebuild every row from the store.
    pub async fn hydrate(&self) -> Result<usize> {
        self.shared.resync().await
    }

    pub async fn len(&self) -> usize {
        self.shared.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rows with `effective_updated_at` strictly after `cursor`, oldest first.
    pub async fn changed_since(&self, cursor: DateTime<Utc>, limit: usize) -> Vec<TierRow> {
        let state = self.shared.state.read().await;
        let mut rows: Vec<&TierRow> = state
            .rows
            .values()
            .filter(|r| r.effective_updated_at.is_some_and(|at| at > cursor))
            .collect();
        rows.sort_by(|a, b| {
            a.effective_updated_at
                .cmp(&b.effective_updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        rows.into_iter().take(limit).cloned().collect()
    }

    /// Stop background maintenance and wait for it to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Incremental view task ended abnormally");
            }
        }
    }
}

impl Drop for IncrementalView {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl TierReader for IncrementalView {
    fn tier(&self) -> Tier {
        Tier::Incremental
    }

    async fn read(&self, key: &str) -> Result<Option<TierRow>> {
        Ok(self.shared.state.read().await.rows.get(key).cloned())
    }
}

async fn maintain(
    shared: Arc<Shared>,
    mut rx: broadcast::Receiver<ChangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            msg = rx.recv() => msg,
        };

        match received {
            Ok(event) => {
                let wait = (event.timestamp + shared.delay - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if !wait.is_zero() {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                shared.apply(&event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Change feed lagged, resynchronizing");
                if let Err(e) = shared.resync().await {
                    tracing::warn!(error = %e, "Resync failed");
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("Incremental view maintenance stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshgraph_core::{ObjectType, Triple, TripleFilter, TripleInput};
    use freshgraph_graph::{MemoryTripleStore, StoreError};
    use freshgraph_ontology::seed::demo_order;

    const ORDER: &str = "order:FM-1001";

    async fn seeded() -> Arc<MemoryTripleStore> {
        let store = Arc::new(MemoryTripleStore::new());
        for result in store.upsert_batch(demo_order("FM-1001")).await {
            result.unwrap();
        }
        store
    }

    /// Poll the view until `check` holds for the order row, or give up.
    async fn eventually(view: &IncrementalView, check: impl Fn(&serde_json::Value) -> bool) -> bool {
        for _ in 0..100 {
            if let Some(row) = view.read(ORDER).await.unwrap() {
                if check(&row.payload) {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn hydrates_existing_rows() {
        let store = seeded().await;
        let view = IncrementalView::spawn(store, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(view.len().await, 1);
        let row = view.read(ORDER).await.unwrap().unwrap();
        assert_eq!(row.payload["line_item_count"], 2);
        view.shutdown().await;
    }

    #[tokio::test]
    async fn change_becomes_visible_after_delay() {
        let store = seeded().await;
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(200))
            .await
            .unwrap();

        store
            .upsert(TripleInput::new(ORDER, "order_status", "PICKING", ObjectType::String))
            .await
            .unwrap();
        let row = view.read(ORDER).await.unwrap().unwrap();
        assert_eq!(row.payload["order_status"], "CREATED");

        assert!(eventually(&view, |p| p["order_status"] == "PICKING").await);
        view.shutdown().await;
    }

    #[tokio::test]
    async fn joined_subject_change_reaches_order() {
        let store = seeded().await;
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(5))
            .await
            .unwrap();

        store
            .upsert(TripleInput::new(
                "customer:C-FM-1001",
                "customer_name",
                "Ada King",
                ObjectType::String,
            ))
            .await
            .unwrap();
        assert!(eventually(&view, |p| p["customer_name"] == "Ada King").await);

        store
            .upsert(TripleInput::new(
                "product:sourdough",
                "product_name",
                "Rye Loaf",
                ObjectType::String,
            ))
            .await
            .unwrap();
        assert!(eventually(&view, |p| p["line_items"][1]["product_name"] == "Rye Loaf").await);
        view.shutdown().await;
    }

    #[tokio::test]
    async fn subject_written_after_order_reaches_row() {
        let store = Arc::new(MemoryTripleStore::new());
        store
            .upsert(TripleInput::new("order:P1", "placed_by", "customer:NEW", ObjectType::EntityRef))
            .await
            .unwrap();
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(5))
            .await
            .unwrap();

        store
            .upsert(TripleInput::new("customer:NEW", "customer_name", "Grace", ObjectType::String))
            .await
            .unwrap();

        let mut name = serde_json::Value::Null;
        for _ in 0..100 {
            if let Some(row) = view.read("order:P1").await.unwrap() {
                name = row.payload["customer_name"].clone();
                if !name.is_null() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(name, "Grace");
        view.shutdown().await;
    }

    /// Delegates to a memory store but fails reads of one chosen subject.
    struct FlakyStore {
        inner: MemoryTripleStore,
        broken: Mutex<Option<String>>,
    }

    impl FlakyStore {
        fn check(&self, subject_id: &str) -> std::result::Result<(), StoreError> {
            let broken = self.broken.lock().map(|b| b.clone()).unwrap_or_default();
            match broken {
                Some(s) if s == subject_id => Err(StoreError::Connection(format!("{s} unreachable"))),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TripleStore for FlakyStore {
        async fn upsert(&self, input: TripleInput) -> std::result::Result<Triple, StoreError> {
            self.inner.upsert(input).await
        }

        async fn touch(&self, subject_id: &str, predicate: &str) -> std::result::Result<Option<Triple>, StoreError> {
            self.inner.touch(subject_id, predicate).await
        }

        async fn delete(&self, subject_id: &str, predicate: &str) -> std::result::Result<u64, StoreError> {
            self.inner.delete(subject_id, predicate).await
        }

        async fn delete_all(&self, subject_prefix: &str) -> std::result::Result<u64, StoreError> {
            self.inner.delete_all(subject_prefix).await
        }

        async fn get(&self, subject_id: &str, predicate: &str) -> std::result::Result<Option<Triple>, StoreError> {
            self.inner.get(subject_id, predicate).await
        }

        async fn subject_triples(&self, subject_id: &str) -> std::result::Result<Vec<Triple>, StoreError> {
            self.check(subject_id)?;
            self.inner.subject_triples(subject_id).await
        }

        async fn find_by_object(&self, predicate: &str, object_value: &str) -> std::result::Result<Vec<Triple>, StoreError> {
            self.inner.find_by_object(predicate, object_value).await
        }

        async fn subjects_with_prefix(&self, prefix: &str) -> std::result::Result<Vec<String>, StoreError> {
            self.inner.subjects_with_prefix(prefix).await
        }

        async fn query(&self, filter: &TripleFilter) -> std::result::Result<Vec<Triple>, StoreError> {
            self.inner.query(filter).await
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn failed_order_does_not_block_other_orders() {
        let store = Arc::new(FlakyStore {
            inner: MemoryTripleStore::new(),
            broken: Mutex::new(None),
        });
        for order in ["order:A", "order:B"] {
            store
                .upsert(TripleInput::new(order, "placed_by", "customer:C", ObjectType::EntityRef))
                .await
                .unwrap();
        }
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(view.len().await, 2);

        // order:A sorts first among the affected keys
        *store.broken.lock().unwrap() = Some("order:A".to_string());
        store
            .upsert(TripleInput::new("customer:C", "customer_name", "Grace", ObjectType::String))
            .await
            .unwrap();

        let mut updated = false;
        for _ in 0..100 {
            let row = view.read("order:B").await.unwrap().unwrap();
            if row.payload["customer_name"] == "Grace" {
                updated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(updated);
        let stale = view.read("order:A").await.unwrap().unwrap();
        assert!(stale.payload["customer_name"].is_null());
        view.shutdown().await;
    }

    #[tokio::test]
    async fn lines_added_and_removed() {
        let store = seeded().await;
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(5))
            .await
            .unwrap();

        let line = "orderline:FM-1001:3";
        store
            .upsert_batch(vec![
                TripleInput::new(line, "line_amount", "1.00", ObjectType::Float),
                TripleInput::new(line, "line_sequence", "3", ObjectType::Int),
                TripleInput::new(line, "line_of_order", ORDER, ObjectType::EntityRef),
            ])
            .await;
        assert!(eventually(&view, |p| p["line_item_count"] == 3 && p["computed_total"] == 9.28).await);

        store.delete_all(line).await.unwrap();
        assert!(eventually(&view, |p| p["line_item_count"] == 2).await);
        view.shutdown().await;
    }

    #[tokio::test]
    async fn deleted_order_is_removed() {
        let store = seeded().await;
        let view = IncrementalView::spawn(store.clone(), Duration::from_millis(5))
            .await
            .unwrap();

        store.delete_all(ORDER).await.unwrap();
        for _ in 0..100 {
            if view.read(ORDER).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(view.is_empty().await);
        view.shutdown().await;
    }

    #[tokio::test]
    async fn changed_since_is_ordered_and_limited() {
        let store = Arc::new(MemoryTripleStore::new());
        for n in 1..=3 {
            store
                .upsert(TripleInput::new(
                    format!("order:FM-{n}"),
                    "order_status",
                    "CREATED",
                    ObjectType::String,
                ))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let view = IncrementalView::spawn(store, Duration::from_millis(5))
            .await
            .unwrap();

        let epoch = DateTime::<Utc>::default();
        let first_two = view.changed_since(epoch, 2).await;
        let keys: Vec<_> = first_two.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["order:FM-1", "order:FM-2"]);

        let cursor = first_two[1].effective_updated_at.unwrap();
        let rest = view.changed_since(cursor, 10).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].key, "order:FM-3");
        view.shutdown().await;
    }
}
