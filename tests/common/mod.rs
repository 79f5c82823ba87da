//! Shared helpers for integration tests.
//!
//! Provides a scripted adapter factory and a feed service wired to an
//! in-memory database with a small source registry.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use trendfeed::content::{ContentItem, Engagement};
use trendfeed::sources::{
    AdapterFactory, Category, FetchMethod, FetchOptions, ResolvedSource, SourceAdapter,
    SourceConfig,
};
use trendfeed::{
    ConfigResolver, Database, FeedService, FreshnessOrchestrator, MemoryCache, Result, Scorer,
    TrendError,
};

pub const LAB: &str = "lab-blog";
pub const FORUM: &str = "forum";
pub const PAPER: &str = "daily-paper";

/// Canned upstream behaviour for one source.
#[derive(Debug, Clone)]
pub enum Upstream {
    Items(Vec<ContentItem>),
    Fail(u16),
}

/// Adapter factory whose adapters replay scripted responses.
///
/// Sources without a script return no items.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: Mutex<HashMap<String, Upstream>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn script(&self, source_id: &str, upstream: Upstream) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source_id.to_string(), upstream);
    }

    /// Adapter fetches so far, across all sources.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct ScriptedAdapter {
    source_id: String,
    upstream: Upstream,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn try_fetch(&self, _options: &FetchOptions) -> Result<Vec<ContentItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.upstream {
            Upstream::Items(items) => Ok(items.clone()),
            Upstream::Fail(status) => Err(TrendError::Http {
                status: *status,
                url: format!("https://{}.example.com", self.source_id),
            }),
        }
    }
}

impl AdapterFactory for ScriptedFactory {
    fn create(&self, source: &ResolvedSource) -> Option<Box<dyn SourceAdapter>> {
        let upstream = self
            .scripts
            .lock()
            .unwrap()
            .get(source.id())
            .cloned()
            .unwrap_or(Upstream::Items(Vec::new()));
        Some(Box::new(ScriptedAdapter {
            source_id: source.id().to_string(),
            upstream,
            calls: self.calls.clone(),
        }))
    }
}

/// Three sources in three categories.
pub fn registry() -> Vec<SourceConfig> {
    vec![
        SourceConfig::feed(LAB, "Lab Blog", Category::AiLabs, "https://lab.example.com", "https://lab.example.com/feed")
            .with_priority(5),
        SourceConfig::endpoint(FORUM, "Forum", Category::Community, "https://forum.example.com", FetchMethod::Api),
        SourceConfig::feed(PAPER, "Daily Paper", Category::News, "https://paper.example.com", "https://paper.example.com/rss")
            .with_priority(2),
    ]
}

/// An item published `age_hours` ago with the given upvotes.
pub fn item(source_id: &str, native_id: &str, title: &str, age_hours: i64, upvotes: u64) -> ContentItem {
    ContentItem::new(
        source_id,
        native_id,
        title,
        format!("https://{source_id}.example.com/{native_id}"),
        Utc::now() - chrono::Duration::hours(age_hours),
    )
    .with_engagement(Engagement {
        upvotes: Some(upvotes),
        ..Default::default()
    })
}

pub struct Harness {
    pub db: Database,
    pub factory: Arc<ScriptedFactory>,
    pub feed: FeedService,
}

impl Harness {
    pub fn resolver(&self) -> &ConfigResolver {
        self.feed.resolver()
    }

    /// Let background health and snapshot writes land.
    pub async fn settle(&self) {
        self.feed.orchestrator().tasks().wait_idle().await;
    }
}

/// Feed service over [`registry`] with every source scripted to two fresh items.
pub async fn harness() -> Harness {
    let db = Database::open_in_memory().await.unwrap();
    let factory = Arc::new(ScriptedFactory::default());
    for source in [LAB, FORUM, PAPER] {
        factory.script(
            source,
            Upstream::Items(vec![
                item(source, "1", &format!("{source} first post"), 1, 10),
                item(source, "2", &format!("{source} second post"), 2, 5),
            ]),
        );
    }

    let resolver = ConfigResolver::with_registry(db.clone(), MemoryCache::new(), registry());
    let orchestrator = FreshnessOrchestrator::new(db.clone(), factory.clone())
        .with_fetch_timeout(Duration::from_millis(500));
    let feed = FeedService::new(resolver, orchestrator, Scorer::default());

    Harness { db, factory, feed }
}
