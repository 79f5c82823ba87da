//! Background refresh and retention scheduler.
//!
//! Periodically runs a freshness pass over every enabled source so the feed
//! stays warm between requests, and sweeps content past its retention window.

use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::freshness::FreshnessOrchestrator;
use crate::settings::ConfigResolver;

/// Default refresh interval in seconds (5 minutes).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Default retention sweep interval in seconds (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

pub struct Scheduler {
    resolver: ConfigResolver,
    orchestrator: FreshnessOrchestrator,
    refresh_interval: Duration,
    sweep_interval: Duration,
    retention_days: u32,
}

impl Scheduler {
    pub fn new(resolver: ConfigResolver, orchestrator: FreshnessOrchestrator) -> Self {
        Self {
            resolver,
            orchestrator,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            retention_days: 30,
        }
    }

    pub fn from_config(
        resolver: ConfigResolver,
        orchestrator: FreshnessOrchestrator,
        config: &Config,
    ) -> Self {
        Self {
            resolver,
            orchestrator,
            refresh_interval: Duration::from_secs(config.scheduler.refresh_interval_secs.max(1)),
            sweep_interval: Duration::from_secs(config.scheduler.sweep_interval_secs.max(1)),
            retention_days: config.store.retention_days,
        }
    }

    pub fn with_intervals(mut self, refresh: Duration, sweep: Duration) -> Self {
        self.refresh_interval = refresh;
        self.sweep_interval = sweep;
        self
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            refresh_secs = self.refresh_interval.as_secs(),
            sweep_secs = self.sweep_interval.as_secs(),
            "Scheduler started"
        );

        let mut refresh = interval(self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopped");
                    return;
                }
                _ = refresh.tick() => self.refresh_once().await,
                _ = sweep.tick() => self.sweep_once().await,
            }
        }
    }

    /// One freshness pass over all enabled sources.
    pub async fn refresh_once(&self) {
        let sources = match self.resolver.effective_sources().await {
            Ok(list) => list.enabled().cloned().collect::<Vec<_>>(),
            Err(e) => {
                error!(error = %e, "Failed to resolve sources for scheduled refresh");
                return;
            }
        };
        if sources.is_empty() {
            debug!("No enabled sources to refresh");
            return;
        }

        let report = self.orchestrator.ensure_fresh(&sources).await;
        for failure in &report.failures {
            warn!(source = %failure.source_id, error = %failure.error, "Scheduled fetch failed");
        }
        if report.fetched.is_empty() {
            debug!(fresh = report.fresh.len(), "Scheduled refresh: nothing stale");
        } else {
            info!(
                fetched = report.fetched.len(),
                failed = report.failures.len(),
                items = report.items_cached,
                "Scheduled refresh complete"
            );
        }
    }

    /// Delete items older than the retention window.
    pub async fn sweep_once(&self) {
        match self.orchestrator.store().sweep(self.retention_days).await {
            Ok(0) => debug!("Retention sweep: nothing to delete"),
            Ok(n) => info!(deleted = n, days = self.retention_days, "Retention sweep complete"),
            Err(e) => error!(error = %e, "Retention sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::content::ContentItem;
    use crate::db::Database;
    use crate::settings::MemoryCache;
    use crate::sources::{AdapterFactory, FetchOptions, ResolvedSource, SourceAdapter};

    struct CountingAdapter {
        source: ResolvedSource,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for CountingAdapter {
        fn source_id(&self) -> &str {
            self.source.id()
        }

        async fn try_fetch(&self, _options: &FetchOptions) -> crate::Result<Vec<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct CountingFactory {
        calls: Arc<AtomicUsize>,
    }

    impl AdapterFactory for CountingFactory {
        fn create(&self, source: &ResolvedSource) -> Option<Box<dyn SourceAdapter>> {
            Some(Box::new(CountingAdapter {
                source: source.clone(),
                calls: self.calls.clone(),
            }))
        }
    }

    async fn scheduler(calls: Arc<AtomicUsize>) -> Scheduler {
        let db = Database::open_in_memory().await.unwrap();
        let resolver = ConfigResolver::new(db.clone(), MemoryCache::new());
        let orchestrator = FreshnessOrchestrator::new(db, Arc::new(CountingFactory { calls }));
        Scheduler::new(resolver, orchestrator)
    }

    #[tokio::test]
    async fn test_refresh_once_fetches_enabled_sources_then_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = scheduler(calls.clone()).await;

        scheduler.refresh_once().await;
        let first = calls.load(Ordering::SeqCst);
        assert!(first > 0);

        scheduler.refresh_once().await;
        assert_eq!(calls.load(Ordering::SeqCst), first);
    }

    #[tokio::test]
    async fn test_sweep_once_on_empty_store() {
        let scheduler = scheduler(Arc::new(AtomicUsize::new(0))).await;
        scheduler.sweep_once().await;
        assert_eq!(scheduler.orchestrator.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let scheduler = scheduler(Arc::new(AtomicUsize::new(0)))
            .await
            .with_intervals(Duration::from_secs(3600), Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), scheduler.run(token))
            .await
            .unwrap();
    }
}
