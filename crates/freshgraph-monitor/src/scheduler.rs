//! The three loops a monitoring session runs.
//!
//! Every loop owns an `Arc` of its session's state and exits when the
//! session's shutdown signal flips. Failures inside a loop are logged and
//! the loop carries on with its next tick.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use freshgraph_graph::TripleStore;
use freshgraph_views::{BatchRefresher, Tier, TierReader, TierRow};

use crate::error::{MonitorError, Result};
use crate::metrics::Sample;
use crate::session::{BatchRefreshRecord, SessionState, Tiers};

/// Re-stamp the marker fact so `effective_updated_at` keeps moving.
pub(crate) async fn heartbeat_loop(
    store: Arc<dyn TripleStore>,
    state: Arc<SessionState>,
    marker_predicate: String,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(subject = %state.subject_id, predicate = %marker_predicate, "Heartbeat started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        match store.touch(&state.subject_id, &marker_predicate).await {
            Ok(Some(_)) => tracing::debug!(subject = %state.subject_id, "Heartbeat"),
            Ok(None) => tracing::debug!(subject = %state.subject_id, "Heartbeat marker absent"),
            Err(e) => tracing::warn!(subject = %state.subject_id, error = %e, "Heartbeat write failed"),
        }
    }
    tracing::info!(subject = %state.subject_id, "Heartbeat stopped");
}

/// Read all three tiers concurrently on every tick and record a sample for
/// each tier that answered in time.
pub(crate) async fn poll_loop(
    tiers: Tiers,
    state: Arc<SessionState>,
    every: Duration,
    read_timeout: Duration,
    batch_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(subject = %state.subject_id, poll_ms = every.as_millis() as u64, "Poller started");

    let subject = state.subject_id.clone();
    let batch_fallback_ms = batch_interval.as_secs_f64() * 1000.0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let (on_demand, batch, incremental) = tokio::join!(
            sample_tier(tiers.on_demand.as_ref(), &subject, read_timeout, None),
            sample_tier(tiers.batch.as_ref(), &subject, read_timeout, Some(batch_fallback_ms)),
            sample_tier(tiers.incremental.as_ref(), &subject, read_timeout, None),
        );

        for (tier, outcome) in [
            (Tier::OnDemand, on_demand),
            (Tier::Batch, batch),
            (Tier::Incremental, incremental),
        ] {
            match outcome {
                Ok((sample, row)) => state.record(tier, sample, row).await,
                Err(e) => tracing::warn!(%tier, error = %e, "Tier read skipped"),
            }
        }
    }
    tracing::info!(subject = %state.subject_id, "Poller stopped");
}

/// Refresh the batch tier every `every`, starting one period after launch.
pub(crate) async fn batch_loop(
    refresher: Arc<dyn BatchRefresher>,
    state: Arc<SessionState>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = every.as_secs(), "Batch driver started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(every) => {}
            _ = shutdown.changed() => break,
        }
        match refresher.refresh().await {
            Ok(report) => {
                let duration_ms = report.duration.as_secs_f64() * 1000.0;
                tracing::info!(rows = report.rows, duration_ms, "Batch tier refreshed");
                state
                    .set_last_refresh(BatchRefreshRecord {
                        at: Utc::now(),
                        rows: report.rows,
                        duration_ms: crate::metrics::round2(duration_ms),
                    })
                    .await;
            }
            Err(e) => tracing::warn!(error = %e, "Batch refresh failed"),
        }
    }
    tracing::info!("Batch driver stopped");
}

/// Time one read of one tier.
///
/// Reaction time is the age of the row's `effective_updated_at`. When the
/// row has none (or is missing) it falls back to `staleness_fallback_ms`,
/// or to the response time if no fallback is given.
pub(crate) async fn sample_tier(
    reader: &dyn TierReader,
    subject_id: &str,
    read_timeout: Duration,
    staleness_fallback_ms: Option<f64>,
) -> Result<(Sample, Option<TierRow>)> {
    let started = Instant::now();
    let row = tokio::time::timeout(read_timeout, reader.read(subject_id))
        .await
        .map_err(|_| MonitorError::Timeout {
            tier: reader.tier().to_string(),
            timeout_ms: read_timeout.as_millis() as u64,
        })??;
    let response_ms = started.elapsed().as_secs_f64() * 1000.0;

    let reaction_ms = row
        .as_ref()
        .and_then(|r| r.effective_updated_at)
        .and_then(|at| (Utc::now() - at).num_microseconds())
        .map(|us| (us as f64 / 1000.0).max(0.0))
        .or(staleness_fallback_ms)
        .unwrap_or(response_ms);

    Ok((
        Sample {
            response_ms,
            reaction_ms,
        },
        row,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use freshgraph_graph::StoreError;
    use freshgraph_views::{RefreshReport, ViewError};

    struct FixedTier {
        row: Option<TierRow>,
    }

    #[async_trait]
    impl TierReader for FixedTier {
        fn tier(&self) -> Tier {
            Tier::Batch
        }

        async fn read(&self, _key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            Ok(self.row.clone())
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

    struct BrokenTier;

    #[async_trait]
    impl TierReader for BrokenTier {
        fn tier(&self) -> Tier {
            Tier::Incremental
        }

        async fn read(&self, key: &str) -> freshgraph_views::Result<Option<TierRow>> {
            Err(ViewError::Store(StoreError::Connection(format!("{key} unreachable"))))
        }
    }

    #[tokio::test]
    async fn reaction_time_is_row_age() {
        let tier = FixedTier {
            row: Some(TierRow {
                key: "order:1".to_string(),
                effective_updated_at: Some(Utc::now() - chrono::Duration::seconds(2)),
                payload: serde_json::json!({}),
            }),
        };
        let (sample, row) = sample_tier(&tier, "order:1", Duration::from_secs(1), Some(60_000.0))
            .await
            .unwrap();
        assert!(row.is_some());
        assert!(sample.reaction_ms >= 2000.0 && sample.reaction_ms < 10_000.0);
    }

    #[tokio::test]
    async fn missing_row_uses_fallback() {
        let tier = FixedTier { row: None };
        let (sample, _) = sample_tier(&tier, "order:1", Duration::from_secs(1), Some(60_000.0))
            .await
            .unwrap();
        assert_eq!(sample.reaction_ms, 60_000.0);

        let (sample, _) = sample_tier(&tier, "order:1", Duration::from_secs(1), None)
            .await
            .unwrap();
        assert_eq!(sample.reaction_ms, sample.response_ms);
    }

    #[tokio::test]
    async fn hung_read_times_out() {
        let outcome = sample_tier(&HungTier, "order:1", Duration::from_millis(20), None).await;
        assert!(matches!(outcome, Err(MonitorError::Timeout { ref tier, .. }) if tier == "on_demand"));
    }

    struct CountingRefresher(AtomicUsize);

    #[async_trait]
    impl BatchRefresher for CountingRefresher {
        async fn refresh(&self) -> freshgraph_views::Result<RefreshReport> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshReport {
                rows: 3,
                duration: Duration::from_millis(2),
            })
        }
    }

    #[tokio::test]
    async fn batch_driver_waits_one_period_then_refreshes() {
        let refresher = Arc::new(CountingRefresher(AtomicUsize::new(0)));
        let state = Arc::new(SessionState::new("order:1".to_string(), 10));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(batch_loop(
            refresher.clone(),
            state.clone(),
            Duration::from_millis(40),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(refresher.0.load(Ordering::SeqCst), 0);
        assert!(state.last_refresh().await.is_none());

        tokio::time::sleep(Duration::from_millis(70)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(refresher.0.load(Ordering::SeqCst) >= 1);
        let record = state.last_refresh().await.unwrap();
        assert_eq!(record.rows, 3);
        assert_eq!(record.duration_ms, 2.0);
    }

    #[tokio::test]
    async fn failed_read_is_an_error() {
        let outcome = sample_tier(&BrokenTier, "order:1", Duration::from_secs(1), None).await;
        assert!(matches!(outcome, Err(MonitorError::View(_))));
    }
}
