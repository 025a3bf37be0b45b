//! Periodic expiry of subscriptions past their end date.

use crate::access::DataAccess;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Rows that were active and due when the sweep started
    pub scanned: usize,
    pub expired: usize,
    /// Rows whose update failed after retries; picked up again next run
    pub failed: usize,
}

/// Marks due subscriptions as expired, once or on a fixed interval
#[derive(Clone)]
pub struct ExpirySweeper {
    access: DataAccess,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(access: DataAccess, interval: Duration) -> Self {
        Self { access, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Expire every active subscription whose end date is at or before `now`.
    ///
    /// Each row is written independently: a row that still fails after
    /// retries is counted in `failed` and left for the next run. Only the
    /// initial scan failing makes the whole sweep fail.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self.access.find_due_for_expiry(now).await?;
        let mut report = SweepReport {
            scanned: due.len(),
            ..SweepReport::default()
        };

        for subscription in &due {
            match self.access.expire_subscription(subscription, now).await {
                Ok(true) => {
                    report.expired += 1;
                    tracing::debug!(
                        subscription_id = subscription.id,
                        user_id = subscription.user_id,
                        "Subscription expired"
                    );
                }
                Ok(false) => {
                    tracing::debug!(
                        subscription_id = subscription.id,
                        "Subscription changed since scan, skipping"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscription_id = subscription.id,
                        user_id = subscription.user_id,
                        error = %e,
                        "Failed to expire subscription"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Run [`run_once`](Self::run_once) every interval on a background task.
    ///
    /// The first sweep happens one interval after spawning.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle {
            shutdown_tx,
            handle,
        }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
            }

            // Not raced against shutdown: a started sweep runs to completion
            match self.run_once(Utc::now()).await {
                Ok(report) => tracing::info!(
                    scanned = report.scanned,
                    expired = report.expired,
                    failed = report.failed,
                    "Expiry sweep finished"
                ),
                Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}

/// Handle to a running sweeper task
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop scheduling sweeps and wait for any in-flight sweep to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Expiry sweeper task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCache, keys};
    use crate::error::SubledgerError;
    use crate::models::SubscriptionStatus;
    use crate::retry::RetryPolicy;
    use crate::store::{InMemoryStore, SubscriptionStore};
    use crate::testing::doubles::FlakyStore;
    use crate::testing::fixtures::subscription_ending;
    use crate::traits::cache::Cache;
    use std::sync::Arc;

    async fn store_with_due_and_current() -> InMemoryStore {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.put_subscription(subscription_ending(1, 10, now - chrono::Duration::days(1))).await;
        store.put_subscription(subscription_ending(2, 11, now - chrono::Duration::minutes(5))).await;
        store.put_subscription(subscription_ending(3, 12, now + chrono::Duration::days(10))).await;
        store
    }

    #[tokio::test]
    async fn test_sweep_expires_due_rows_only() {
        let store = store_with_due_and_current().await;
        let access = DataAccess::new(Arc::new(store.clone()), Arc::new(InMemoryCache::new(100)));
        let sweeper = ExpirySweeper::new(access, Duration::from_secs(3600));

        let report = sweeper.run_once(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport { scanned: 2, expired: 2, failed: 0 });
        let current = store.get_subscription(12).await.unwrap().unwrap();
        assert_eq!(current.status, SubscriptionStatus::Active);
        let expired = store.get_subscription(10).await.unwrap().unwrap();
        assert_eq!(expired.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = store_with_due_and_current().await;
        let access = DataAccess::new(Arc::new(store), Arc::new(InMemoryCache::new(100)));
        let sweeper = ExpirySweeper::new(access, Duration::from_secs(3600));
        let now = Utc::now();

        sweeper.run_once(now).await.unwrap();
        let second = sweeper.run_once(now).await.unwrap();

        assert_eq!(second, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_invalidates_cached_entries() {
        let store = store_with_due_and_current().await;
        let cache = Arc::new(InMemoryCache::new(100));
        let access = DataAccess::new(Arc::new(store), cache.clone());
        access.get_subscription(10).await.unwrap();
        assert!(cache.get_bytes(&keys::subscription(10)).await.unwrap().is_some());

        ExpirySweeper::new(access.clone(), Duration::from_secs(3600))
            .run_once(Utc::now())
            .await
            .unwrap();

        assert!(cache.get_bytes(&keys::subscription(10)).await.unwrap().is_none());
        let reread = access.get_subscription(10).await.unwrap();
        assert_eq!(reread.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn test_failed_row_is_skipped_and_retried_next_run() {
        let inner = store_with_due_and_current().await;
        let store = Arc::new(FlakyStore::new(inner.clone(), "mark_expired", 1, || {
            SubledgerError::database("deadlock detected")
        }));
        let access = DataAccess::new(store, Arc::new(InMemoryCache::new(100)))
            .with_retry(RetryPolicy::no_retry());
        let sweeper = ExpirySweeper::new(access, Duration::from_secs(3600));
        let now = Utc::now();

        let first = sweeper.run_once(now).await.unwrap();
        assert_eq!(first, SweepReport { scanned: 2, expired: 1, failed: 1 });

        let second = sweeper.run_once(now).await.unwrap();
        assert_eq!(second, SweepReport { scanned: 1, expired: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_scan_failure_fails_the_sweep() {
        let store = Arc::new(FlakyStore::down(InMemoryStore::new(), "find_due_for_expiry"));
        let access = DataAccess::new(store, Arc::new(InMemoryCache::new(100)))
            .with_retry(RetryPolicy::no_retry());

        let err = ExpirySweeper::new(access, Duration::from_secs(3600))
            .run_once(Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SubledgerError::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_on_interval_and_stops() {
        let store = store_with_due_and_current().await;
        let access = DataAccess::new(Arc::new(store.clone()), Arc::new(InMemoryCache::new(100)));
        let interval = Duration::from_secs(3600);
        let handle = ExpirySweeper::new(access, interval).spawn();

        // Nothing happens before the first interval elapses
        tokio::time::sleep(interval / 2).await;
        assert!(!store.find_due_for_expiry(Utc::now()).await.unwrap().is_empty());

        tokio::time::sleep(interval).await;
        assert!(store.find_due_for_expiry(Utc::now()).await.unwrap().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_sweep_finish() {
        let inner = InMemoryStore::new();
        let now = Utc::now();
        for (id, user_id) in [(1, 10), (2, 11), (3, 12)] {
            inner
                .put_subscription(subscription_ending(id, user_id, now - chrono::Duration::hours(1)))
                .await;
        }
        // First row needs the full retry budget: 100ms then 200ms of backoff
        let store = Arc::new(FlakyStore::new(inner.clone(), "mark_expired", 2, || {
            SubledgerError::database("deadlock detected")
        }));
        let access = DataAccess::new(store.clone(), Arc::new(InMemoryCache::new(100)));
        let interval = Duration::from_secs(3600);
        let handle = ExpirySweeper::new(access, interval).spawn();

        // Land inside the first backoff of the first sweep
        tokio::time::sleep(interval + Duration::from_millis(50)).await;
        assert_eq!(store.attempts(), 1);
        assert_eq!(inner.find_due_for_expiry(Utc::now()).await.unwrap().len(), 3);

        handle.shutdown().await;

        assert!(inner.find_due_for_expiry(Utc::now()).await.unwrap().is_empty());
        assert_eq!(store.attempts(), 5);
    }
}
