//! Keeps the content store fresh before it is queried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::policy::FreshnessPolicy;
use super::repository::{FreshnessRepository, HealthRepository};
use super::tasks::BackgroundTasks;
use crate::config::Config;
use crate::content::{ContentItem, ContentStore};
use crate::db::Database;
use crate::ingest::dedup_by_id;
use crate::sources::{
    AdapterFactory, FetchOptions, ResolvedSource, SourceAdapter, SourceRecord, SourceRepository,
};
use crate::velocity::VelocityTracker;
use crate::{Result, TrendError};

/// Default per-adapter deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Stale/fresh split of a set of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessPartition {
    pub stale: Vec<String>,
    pub fresh: Vec<String>,
}

/// A source whose fetch failed during a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub source_id: String,
    pub source_name: String,
    pub error: String,
}

/// Outcome of one [`FreshnessOrchestrator::ensure_fresh`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    /// Sources fetched successfully, including those that returned nothing.
    pub fetched: Vec<String>,
    /// Sources still within their TTL.
    pub fresh: Vec<String>,
    /// Stale sources with no adapter (disabled, unroutable or missing a key).
    pub skipped: Vec<String>,
    pub failures: Vec<SourceFailure>,
    pub items_cached: usize,
}

enum HealthUpdate {
    Success(String, usize),
    Empty(String),
    Failure(String, String),
}

/// Refreshes stale sources and persists their items.
#[derive(Clone)]
pub struct FreshnessOrchestrator {
    db: Database,
    store: ContentStore,
    velocity: VelocityTracker,
    factory: Arc<dyn AdapterFactory>,
    policy: FreshnessPolicy,
    tasks: BackgroundTasks,
    fetch_timeout: Duration,
    fetch_options: FetchOptions,
}

impl FreshnessOrchestrator {
    pub fn new(db: Database, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            store: ContentStore::new(db.clone()),
            velocity: VelocityTracker::new(db.clone()),
            db,
            factory,
            policy: FreshnessPolicy::default(),
            tasks: BackgroundTasks::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_options: FetchOptions::default(),
        }
    }

    /// Build with TTLs, timeouts, retry and store settings from `config`.
    pub fn from_config(db: Database, factory: Arc<dyn AdapterFactory>, config: &Config) -> Self {
        let store = ContentStore::new(db.clone())
            .with_batch_size(config.store.batch_size)
            .with_per_source_floor(config.store.per_source_floor);
        Self {
            store,
            policy: FreshnessPolicy::from_config(&config.freshness),
            fetch_timeout: Duration::from_secs(config.fetch.source_timeout_secs),
            fetch_options: FetchOptions {
                time_range: None,
                max_retries: config.fetch.max_retries,
                retry_delay_ms: config.fetch.retry_delay_ms,
            },
            ..Self::new(db, factory)
        }
    }

    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    pub fn with_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn velocity(&self) -> &VelocityTracker {
        &self.velocity
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Split `sources` into stale and fresh ids using the TTL policy.
    pub async fn get_freshness(
        &self,
        sources: &[ResolvedSource],
        now: DateTime<Utc>,
    ) -> Result<FreshnessPartition> {
        let ids: Vec<String> = sources.iter().map(|s| s.id().to_string()).collect();
        let last = FreshnessRepository::new(self.db.pool()).last_fetched(&ids).await?;

        let mut partition = FreshnessPartition::default();
        for source in sources {
            let last_fetched = last.get(source.id()).copied();
            if self.policy.is_stale(source.category(), last_fetched, now) {
                partition.stale.push(source.id().to_string());
            } else {
                partition.fresh.push(source.id().to_string());
            }
        }
        Ok(partition)
    }

    /// Record `source_ids` as fetched now.
    pub async fn mark_fetched(&self, source_ids: &[String]) -> Result<()> {
        FreshnessRepository::new(self.db.pool())
            .mark_fetched(source_ids, Utc::now())
            .await
    }

    /// Fetch every stale source in `sources` concurrently and cache the items.
    ///
    /// Never fails: adapter errors and timeouts are reported in
    /// [`RefreshReport::failures`] and leave the source stale, storage errors
    /// are logged. Health records and engagement snapshots are written in the
    /// background.
    pub async fn ensure_fresh(&self, sources: &[ResolvedSource]) -> RefreshReport {
        let now = Utc::now();
        let mut report = RefreshReport::default();

        let partition = match self.get_freshness(sources, now).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Freshness lookup failed, treating all sources as stale");
                FreshnessPartition {
                    stale: sources.iter().map(|s| s.id().to_string()).collect(),
                    fresh: Vec::new(),
                }
            }
        };
        report.fresh = partition.fresh;
        if partition.stale.is_empty() {
            debug!(fresh = report.fresh.len(), "All sources fresh");
            return report;
        }

        let mut targets = Vec::new();
        for source in sources.iter().filter(|s| partition.stale.iter().any(|id| id == s.id())) {
            match self.factory.create(source) {
                Some(adapter) => targets.push((source, adapter)),
                None => report.skipped.push(source.id().to_string()),
            }
        }

        let options = self.fetch_options;
        let timeout = self.fetch_timeout;
        let outcomes = join_all(targets.iter().map(|(_, adapter)| async move {
            match tokio::time::timeout(timeout, adapter.try_fetch(&options)).await {
                Ok(result) => result,
                Err(_) => Err(TrendError::Timeout(format!("no response within {timeout:?}"))),
            }
        }))
        .await;

        let mut items: Vec<ContentItem> = Vec::new();
        let mut health = Vec::with_capacity(targets.len());
        for ((source, _), outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(fetched) => {
                    report.fetched.push(source.id().to_string());
                    health.push(if fetched.is_empty() {
                        HealthUpdate::Empty(source.id().to_string())
                    } else {
                        HealthUpdate::Success(source.id().to_string(), fetched.len())
                    });
                    items.extend(fetched);
                }
                Err(e) => {
                    warn!(source = %source.id(), error = %e, "Source fetch failed");
                    health.push(HealthUpdate::Failure(source.id().to_string(), e.to_string()));
                    report.failures.push(SourceFailure {
                        source_id: source.id().to_string(),
                        source_name: source.config.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let items = dedup_by_id(items);
        report.items_cached = self.persist(&targets, &items).await;

        if let Err(e) = FreshnessRepository::new(self.db.pool())
            .mark_fetched(&report.fetched, now)
            .await
        {
            warn!(error = %e, "Failed to record fetch times");
        }

        self.dispatch_health(health, now);
        self.dispatch_snapshots(&items, now);

        info!(
            fetched = report.fetched.len(),
            fresh = report.fresh.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            items = report.items_cached,
            "Freshness pass complete"
        );
        report
    }

    async fn persist(
        &self,
        targets: &[(&ResolvedSource, Box<dyn SourceAdapter>)],
        items: &[ContentItem],
    ) -> usize {
        if items.is_empty() {
            return 0;
        }
        let records: Vec<SourceRecord> = targets.iter().map(|(s, _)| SourceRecord::from(*s)).collect();
        if let Err(e) = SourceRepository::new(self.db.pool()).sync(&records).await {
            warn!(error = %e, "Failed to sync sources before upsert");
        }
        match self.store.upsert(items).await {
            Ok(summary) => summary.cached,
            Err(e) => {
                warn!(error = %e, "Failed to cache fetched items");
                0
            }
        }
    }

    fn dispatch_health(&self, updates: Vec<HealthUpdate>, now: DateTime<Utc>) {
        if updates.is_empty() {
            return;
        }
        let db = self.db.clone();
        self.tasks.spawn("source-health", async move {
            let repo = HealthRepository::new(db.pool());
            for update in updates {
                match update {
                    HealthUpdate::Success(id, count) => repo.record_success(&id, count, now).await?,
                    HealthUpdate::Empty(id) => repo.record_empty(&id, now).await?,
                    HealthUpdate::Failure(id, error) => repo.record_failure(&id, &error, now).await?,
                }
            }
            Ok(())
        });
    }

    fn dispatch_snapshots(&self, items: &[ContentItem], now: DateTime<Utc>) {
        let snapshots: Vec<_> = items
            .iter()
            .filter_map(|item| item.engagement.clone().map(|e| (item.id.clone(), e)))
            .collect();
        if snapshots.is_empty() {
            return;
        }
        let velocity = self.velocity.clone();
        self.tasks.spawn("engagement-snapshots", async move {
            velocity.record_snapshots_batch(&snapshots, now).await.map(|_| ())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Engagement;
    use crate::freshness::EMPTY_RESULT;
    use crate::sources::{Category, FetchMethod, SourceConfig};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Behavior {
        Items(usize),
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct StubFactory {
        behaviors: Mutex<HashMap<String, Behavior>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubFactory {
        fn with(self, id: &str, behavior: Behavior) -> Self {
            self.behaviors.lock().unwrap().insert(id.to_string(), behavior);
            self
        }
    }

    struct StubAdapter {
        id: String,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source_id(&self) -> &str {
            &self.id
        }

        async fn try_fetch(&self, _options: &FetchOptions) -> Result<Vec<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Items(n) => Ok((0..n)
                    .map(|i| {
                        ContentItem::new(&self.id, &i.to_string(), format!("{} #{i}", self.id), "https://x", Utc::now())
                            .with_engagement(Engagement {
                                upvotes: Some(10 * i as u64 + 1),
                                ..Default::default()
                            })
                    })
                    .collect()),
                Behavior::Fail => Err(TrendError::Http {
                    status: 503,
                    url: "https://x".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    impl AdapterFactory for StubFactory {
        fn create(&self, source: &ResolvedSource) -> Option<Box<dyn SourceAdapter>> {
            let behavior = self.behaviors.lock().unwrap().get(source.id()).cloned()?;
            Some(Box::new(StubAdapter {
                id: source.id().to_string(),
                behavior,
                calls: self.calls.clone(),
            }))
        }
    }

    fn resolved(id: &str, category: Category) -> ResolvedSource {
        ResolvedSource {
            config: SourceConfig::endpoint(id, &id.to_uppercase(), category, "https://x", FetchMethod::Api),
            is_enabled: true,
            effective_priority: 3,
            is_custom: false,
        }
    }

    async fn orchestrator(factory: StubFactory) -> (FreshnessOrchestrator, Arc<AtomicUsize>) {
        let db = Database::open_in_memory().await.unwrap();
        let calls = factory.calls.clone();
        let orch = FreshnessOrchestrator::new(db, Arc::new(factory))
            .with_fetch_timeout(Duration::from_millis(200));
        (orch, calls)
    }

    #[tokio::test]
    async fn test_cold_start_fetches_and_caches() {
        let factory = StubFactory::default()
            .with("a", Behavior::Items(3))
            .with("b", Behavior::Items(2));
        let (orch, calls) = orchestrator(factory).await;
        let sources = vec![resolved("a", Category::News), resolved("b", Category::Community)];

        let report = orch.ensure_fresh(&sources).await;
        assert_eq!(report.fetched.len(), 2);
        assert_eq!(report.items_cached, 5);
        assert!(report.failures.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(orch.store().count().await.unwrap(), 5);

        let partition = orch.get_freshness(&sources, Utc::now()).await.unwrap();
        assert!(partition.stale.is_empty());
        assert_eq!(partition.fresh.len(), 2);
    }

    #[tokio::test]
    async fn test_second_pass_within_ttl_fetches_nothing() {
        let factory = StubFactory::default().with("a", Behavior::Items(1));
        let (orch, calls) = orchestrator(factory).await;
        let sources = vec![resolved("a", Category::News)];

        orch.ensure_fresh(&sources).await;
        let report = orch.ensure_fresh(&sources).await;
        assert_eq!(report.fresh, vec!["a".to_string()]);
        assert!(report.fetched.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_left_stale() {
        let factory = StubFactory::default()
            .with("good", Behavior::Items(2))
            .with("bad", Behavior::Fail);
        let (orch, _) = orchestrator(factory).await;
        let sources = vec![resolved("good", Category::News), resolved("bad", Category::News)];

        let report = orch.ensure_fresh(&sources).await;
        assert_eq!(report.fetched, vec!["good".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_name, "BAD");
        assert!(report.failures[0].error.contains("503"));
        assert_eq!(report.items_cached, 2);

        let partition = orch.get_freshness(&sources, Utc::now()).await.unwrap();
        assert_eq!(partition.stale, vec!["bad".to_string()]);

        orch.tasks().wait_idle().await;
        let health = HealthRepository::new(orch.db.pool()).get("bad").await.unwrap().unwrap();
        assert_eq!(health.consecutive_failures, 1);
        let health = HealthRepository::new(orch.db.pool()).get("good").await.unwrap().unwrap();
        assert_eq!(health.last_item_count, 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let factory = StubFactory::default()
            .with("slow", Behavior::Hang)
            .with("fast", Behavior::Items(1));
        let (orch, _) = orchestrator(factory).await;
        let sources = vec![resolved("slow", Category::News), resolved("fast", Category::News)];

        let report = orch.ensure_fresh(&sources).await;
        assert_eq!(report.fetched, vec!["fast".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_result_is_fetched_but_unhealthy() {
        let factory = StubFactory::default().with("quiet", Behavior::Items(0));
        let (orch, _) = orchestrator(factory).await;
        let sources = vec![resolved("quiet", Category::Newsletters)];

        let report = orch.ensure_fresh(&sources).await;
        assert_eq!(report.fetched, vec!["quiet".to_string()]);
        assert!(report.failures.is_empty());

        orch.tasks().wait_idle().await;
        let health = HealthRepository::new(orch.db.pool()).get("quiet").await.unwrap().unwrap();
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.last_error.as_deref(), Some(EMPTY_RESULT));
    }

    #[tokio::test]
    async fn test_sources_without_adapter_are_skipped() {
        let (orch, calls) = orchestrator(StubFactory::default()).await;
        let report = orch.ensure_fresh(&[resolved("nokey", Category::DevPlatforms)]).await;
        assert_eq!(report.skipped, vec!["nokey".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_staleness_follows_category_ttl() {
        let (orch, _) = orchestrator(StubFactory::default()).await;
        let sources = vec![resolved("c", Category::Community), resolved("l", Category::Leaderboards)];
        let ids: Vec<String> = vec!["c".into(), "l".into()];
        let ten_minutes_ago = Utc::now() - ChronoDuration::minutes(10);
        FreshnessRepository::new(orch.db.pool())
            .mark_fetched(&ids, ten_minutes_ago)
            .await
            .unwrap();

        let partition = orch.get_freshness(&sources, Utc::now()).await.unwrap();
        assert_eq!(partition.stale, vec!["c".to_string()]);
        assert_eq!(partition.fresh, vec!["l".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshots_recorded_in_background() {
        let factory = StubFactory::default().with("a", Behavior::Items(2));
        let (orch, _) = orchestrator(factory).await;
        orch.ensure_fresh(&[resolved("a", Category::News)]).await;
        orch.tasks().wait_idle().await;

        let ids: Vec<String> = (0..2)
            .map(|i| crate::content::content_id("a", &i.to_string()))
            .collect();
        let velocities = orch.velocity().bulk_velocities(&ids, Utc::now()).await.unwrap();
        assert_eq!(velocities.len(), 2);
    }
}
