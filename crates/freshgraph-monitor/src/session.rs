//! The session controller: one monitored subject at a time.
//!
//! Every `start` builds a brand-new [`SessionState`] and hands it to the new
//! loops. The previous session's loops are stopped and awaited first, so none
//! of them can record into the new session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use freshgraph_graph::TripleStore;
use freshgraph_views::{BatchRefresher, Tier, TierReader, TierRow};

use crate::config::MonitorConfig;
use crate::metrics::{RingBuffer, Sample, TierStats};
use crate::scheduler;

/// The stores and views a session measures.
#[derive(Clone)]
pub struct Tiers {
    pub store: Arc<dyn TripleStore>,
    pub on_demand: Arc<dyn TierReader>,
    pub batch: Arc<dyn TierReader>,
    pub refresher: Arc<dyn BatchRefresher>,
    pub incremental: Arc<dyn TierReader>,
}

impl Tiers {
    pub fn new<B>(
        store: Arc<dyn TripleStore>,
        on_demand: Arc<dyn TierReader>,
        batch: Arc<B>,
        incremental: Arc<dyn TierReader>,
    ) -> Self
    where
        B: TierReader + BatchRefresher + 'static,
    {
        Self {
            store,
            on_demand,
            batch: batch.clone(),
            refresher: batch,
            incremental,
        }
    }
}

/// One value per tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerTier<T> {
    pub on_demand: T,
    pub batch: T,
    pub incremental: T,
}

impl<T> PerTier<T> {
    pub fn get(&self, tier: Tier) -> &T {
        match tier {
            Tier::OnDemand => &self.on_demand,
            Tier::Batch => &self.batch,
            Tier::Incremental => &self.incremental,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut T {
        match tier {
            Tier::OnDemand => &mut self.on_demand,
            Tier::Batch => &mut self.batch,
            Tier::Incremental => &mut self.incremental,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerTier<U> {
        PerTier {
            on_demand: f(&self.on_demand),
            batch: f(&self.batch),
            incremental: f(&self.incremental),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRefreshRecord {
    pub at: DateTime<Utc>,
    pub rows: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub subject_id: Option<String>,
    pub is_polling: bool,
    pub on_demand: TierStats,
    pub batch: TierStats,
    pub incremental: TierStats,
    pub last_batch_refresh: Option<BatchRefreshRecord>,
    pub timestamp: DateTime<Utc>,
}

/// Everything one session records. Owned jointly by its loops.
pub(crate) struct SessionState {
    pub(crate) subject_id: String,
    buffers: Mutex<PerTier<RingBuffer>>,
    latest: Mutex<PerTier<Option<TierRow>>>,
    last_refresh: Mutex<Option<BatchRefreshRecord>>,
}

impl SessionState {
    pub(crate) fn new(subject_id: String, max_samples: usize) -> Self {
        Self {
            subject_id,
            buffers: Mutex::new(PerTier {
                on_demand: RingBuffer::new(max_samples),
                batch: RingBuffer::new(max_samples),
                incremental: RingBuffer::new(max_samples),
            }),
            latest: Mutex::new(PerTier::default()),
            last_refresh: Mutex::new(None),
        }
    }

    pub(crate) async fn record(&self, tier: Tier, sample: Sample, row: Option<TierRow>) {
        self.buffers.lock().await.get_mut(tier).push(sample);
        // A miss keeps the last row actually seen.
        if let Some(row) = row {
            *self.latest.lock().await.get_mut(tier) = Some(row);
        }
    }

    pub(crate) async fn last_refresh(&self) -> Option<BatchRefreshRecord> {
        self.last_refresh.lock().await.clone()
    }

    pub(crate) async fn set_last_refresh(&self, record: BatchRefreshRecord) {
        *self.last_refresh.lock().await = Some(record);
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Running {
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Monitor task panicked");
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    state: Option<Arc<SessionState>>,
    running: Option<Running>,
}

/// Runs at most one monitoring session at a time.
pub struct FreshnessMonitor {
    tiers: Tiers,
    config: MonitorConfig,
    inner: Mutex<Inner>,
}

impl FreshnessMonitor {
    pub fn new(tiers: Tiers, config: MonitorConfig) -> Self {
        Self {
            tiers,
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Begin monitoring `subject_id`, replacing any running session.
    pub async fn start(&self, subject_id: impl Into<String>) {
        let subject_id = subject_id.into();
        let mut inner = self.inner.lock().await;
        if let Some(previous) = inner.running.take() {
            previous.stop().await;
        }

        let state = Arc::new(SessionState::new(subject_id.clone(), self.config.max_samples));
        let (shutdown, rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(scheduler::heartbeat_loop(
                self.tiers.store.clone(),
                state.clone(),
                self.config.marker_predicate.clone(),
                self.config.heartbeat_interval(),
                rx.clone(),
            )),
            tokio::spawn(scheduler::poll_loop(
                self.tiers.clone(),
                state.clone(),
                self.config.poll_interval(),
                self.config.read_timeout(),
                self.config.batch_refresh_interval(),
                rx.clone(),
            )),
            tokio::spawn(scheduler::batch_loop(
                self.tiers.refresher.clone(),
                state.clone(),
                self.config.batch_refresh_interval(),
                rx,
            )),
        ];

        inner.state = Some(state);
        inner.running = Some(Running { shutdown, handles });
        tracing::info!(subject = %subject_id, "Monitoring session started");
    }

    /// Stop the running session, if any, and wait for its loops to exit.
    /// The session's samples stay readable until the next `start`.
    pub async fn stop(&self) {
        let running = self.inner.lock().await.running.take();
        if let Some(running) = running {
            running.stop().await;
            tracing::info!("Monitoring session stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running.is_some()
    }

    /// The subject of the running session.
    pub async fn current_subject(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .running
            .as_ref()
            .and(inner.state.as_ref())
            .map(|s| s.subject_id.clone())
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        let (state, is_polling) = self.session().await;
        let (stats, last_batch_refresh) = match &state {
            Some(state) => (
                state.buffers.lock().await.map(RingBuffer::stats),
                state.last_refresh().await,
            ),
            None => (PerTier::default(), None),
        };
        MetricsSnapshot {
            subject_id: state.map(|s| s.subject_id.clone()),
            is_polling,
            on_demand: stats.on_demand,
            batch: stats.batch,
            incremental: stats.incremental,
            last_batch_refresh,
            timestamp: Utc::now(),
        }
    }

    /// Raw reaction times per tier, oldest first.
    pub async fn history(&self) -> PerTier<Vec<f64>> {
        match self.session().await.0 {
            Some(state) => state.buffers.lock().await.map(RingBuffer::reaction_times),
            None => PerTier::default(),
        }
    }

    /// The most recent row each tier returned.
    pub async fn order_data(&self) -> PerTier<Option<TierRow>> {
        match self.session().await.0 {
            Some(state) => state.latest.lock().await.clone(),
            None => PerTier::default(),
        }
    }

    async fn session(&self) -> (Option<Arc<SessionState>>, bool) {
        let inner = self.inner.lock().await;
        (inner.state.clone(), inner.running.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use freshgraph_core::{ObjectType, TripleInput};
    use freshgraph_graph::{MemoryTripleStore, StoreError};
    use freshgraph_views::{RefreshReport, ViewError};

    /// Serves a fixed-age row for any key.
    struct FakeTier {
        tier: Tier,
        age: chrono::Duration,
    }

    impl FakeTier {
        fn new(tier: Tier, age_ms: i64) -> Arc<Self> {
            Arc::new(Self {
                tier,
                age: chrono::Duration::milliseconds(age_ms),
            })
        }
    }

    #[async_trait]
    impl TierReader for FakeTier {
        fn tier(&self) -> Tier {
            self.tier
        }

        async fn read(&self, key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            Ok(Some(TierRow {
                key: key.to_string(),
                effective_updated_at: Some(Utc::now() - self.age),
                payload: serde_json::json!({ "order_id": key }),
            }))
        }
    }

    #[async_trait]
    impl BatchRefresher for FakeTier {
        async fn refresh(&self) -> freshgraph_views::Result<RefreshReport> {
            Ok(RefreshReport {
                rows: 1,
                duration: Duration::from_millis(1),
            })
        }
    }

    struct FailingTier;

    #[async_trait]
    impl TierReader for FailingTier {
        fn tier(&self) -> Tier {
            Tier::Incremental
        }

        async fn read(&self, _key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            Err(ViewError::Store(StoreError::Connection("offline".to_string())))
        }
    }

    struct HungTier;

    #[async_trait]
    impl TierReader for HungTier {
        fn tier(&self) -> Tier {
            Tier::OnDemand
        }

        async fn read(&self, _key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            std::future::pending().await
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 10,
            heartbeat_interval_ms: 20,
            batch_refresh_interval_secs: 3600,
            max_samples: 50,
            read_timeout_ms: 30,
            ..Default::default()
        }
    }

    fn fake_tiers(
        on_demand: Arc<dyn TierReader>,
        incremental: Arc<dyn TierReader>,
    ) -> (Tiers, Arc<MemoryTripleStore>) {
        let store = Arc::new(MemoryTripleStore::new());
        let tiers = Tiers::new(
            store.clone(),
            on_demand,
            FakeTier::new(Tier::Batch, 30_000),
            incremental,
        );
        (tiers, store)
    }

    #[tokio::test]
    async fn records_samples_for_every_tier() {
        let (tiers, _) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 100),
        );
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        monitor.start("order:1").await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let metrics = monitor.metrics().await;
        assert!(metrics.is_polling);
        assert_eq!(metrics.subject_id.as_deref(), Some("order:1"));
        for tier in Tier::ALL {
            let stats = match tier {
                Tier::OnDemand => metrics.on_demand,
                Tier::Batch => metrics.batch,
                Tier::Incremental => metrics.incremental,
            };
            assert!(stats.sample_count >= 1, "{tier} has no samples");
        }
        assert!(metrics.batch.reaction_time.median >= 30_000.0);
        monitor.stop().await;
    }

    #[tokio::test]
    async fn restart_never_mixes_sessions() {
        let (tiers, _) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 0),
        );
        let monitor = FreshnessMonitor::new(tiers, fast_config());

        monitor.start("order:X").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop().await;
        assert!(!monitor.is_running().await);
        assert_eq!(monitor.current_subject().await, None);
        let x_count = monitor.metrics().await.on_demand.sample_count;
        assert!(x_count > 0);

        // no loop of the stopped session is still writing
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(monitor.metrics().await.on_demand.sample_count, x_count);

        monitor.start("order:Y").await;
        let metrics = monitor.metrics().await;
        assert_eq!(metrics.subject_id.as_deref(), Some("order:Y"));
        assert!(metrics.on_demand.sample_count <= 1);
        assert_eq!(monitor.current_subject().await.as_deref(), Some("order:Y"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        if let Some(row) = monitor.order_data().await.on_demand {
            assert_eq!(row.key, "order:Y");
        }
        monitor.stop().await;
    }

    #[tokio::test]
    async fn start_replaces_running_session() {
        let (tiers, _) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 0),
        );
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        monitor.start("order:A").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.start("order:B").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let data = monitor.order_data().await;
        assert_eq!(data.incremental.map(|r| r.key).as_deref(), Some("order:B"));
        monitor.stop().await;
    }

    #[tokio::test]
    async fn failing_and_hung_tiers_do_not_block_others() {
        let (tiers, _) = fake_tiers(Arc::new(HungTier), Arc::new(FailingTier));
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        monitor.start("order:1").await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let metrics = monitor.metrics().await;
        assert_eq!(metrics.on_demand.sample_count, 0);
        assert_eq!(metrics.incremental.sample_count, 0);
        assert!(metrics.batch.sample_count >= 2);
        monitor.stop().await;
    }

    /// Returns a row on the first read only.
    struct VanishingTier {
        reads: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TierReader for VanishingTier {
        fn tier(&self) -> Tier {
            Tier::OnDemand
        }

        async fn read(&self, key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            if self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
                return Ok(None);
            }
            Ok(Some(TierRow {
                key: key.to_string(),
                effective_updated_at: Some(Utc::now()),
                payload: serde_json::json!({ "order_id": key }),
            }))
        }
    }

    #[tokio::test]
    async fn latest_row_survives_later_misses() {
        let vanishing = Arc::new(VanishingTier {
            reads: std::sync::atomic::AtomicUsize::new(0),
        });
        let (tiers, _) = fake_tiers(vanishing.clone(), FakeTier::new(Tier::Incremental, 0));
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        monitor.start("order:1").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;

        assert!(vanishing.reads.load(std::sync::atomic::Ordering::SeqCst) > 1);
        assert!(monitor.metrics().await.on_demand.sample_count > 1);
        let kept = monitor.order_data().await.on_demand.unwrap();
        assert_eq!(kept.key, "order:1");
    }

    #[tokio::test]
    async fn buffers_are_bounded() {
        let (tiers, _) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 0),
        );
        let config = MonitorConfig {
            poll_interval_ms: 1,
            max_samples: 5,
            ..fast_config()
        };
        let monitor = FreshnessMonitor::new(tiers, config);
        monitor.start("order:1").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;

        assert_eq!(monitor.metrics().await.on_demand.sample_count, 5);
        assert_eq!(monitor.history().await.batch.len(), 5);
    }

    #[tokio::test]
    async fn heartbeat_touches_marker() {
        let (tiers, store) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 0),
        );
        let written = store
            .upsert(TripleInput::new("order:1", "order_status", "CREATED", ObjectType::String))
            .await
            .unwrap();
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        monitor.start("order:1").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;

        let touched = store.get("order:1", "order_status").await.unwrap().unwrap();
        assert!(touched.updated_at > written.updated_at);
        assert_eq!(touched.object_value, "CREATED");
    }

    #[tokio::test]
    async fn idle_monitor_reports_zeros() {
        let (tiers, _) = fake_tiers(
            FakeTier::new(Tier::OnDemand, 0),
            FakeTier::new(Tier::Incremental, 0),
        );
        let monitor = FreshnessMonitor::new(tiers, fast_config());
        let metrics = monitor.metrics().await;
        assert!(!metrics.is_polling);
        assert!(metrics.subject_id.is_none());
        assert_eq!(metrics.incremental, TierStats::default());
        monitor.stop().await;
    }
}
