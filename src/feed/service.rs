//! Builds ranked feed responses.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tracing::{debug, warn};

use super::query::FeedQuery;
use super::response::{FeedFailure, FeedItem, FeedMeta, FeedResponse};
use crate::config::Config;
use crate::freshness::FreshnessOrchestrator;
use crate::ingest::KeywordMatcher;
use crate::scoring::{Scorer, ScoringContext};
use crate::settings::ConfigResolver;
use crate::sources::{Category, ResolvedSource};
use crate::Result;

/// Default number of stored items considered per request.
pub const DEFAULT_QUERY_WINDOW: usize = 500;

/// Serves the ranked feed.
#[derive(Clone)]
pub struct FeedService {
    resolver: ConfigResolver,
    orchestrator: FreshnessOrchestrator,
    scorer: Scorer,
    query_window: usize,
}

impl FeedService {
    pub fn new(resolver: ConfigResolver, orchestrator: FreshnessOrchestrator, scorer: Scorer) -> Self {
        Self {
            resolver,
            orchestrator,
            scorer,
            query_window: DEFAULT_QUERY_WINDOW,
        }
    }

    pub fn from_config(
        resolver: ConfigResolver,
        orchestrator: FreshnessOrchestrator,
        config: &Config,
    ) -> Self {
        Self {
            query_window: config.store.query_window.max(1),
            ..Self::new(resolver, orchestrator, Scorer::new(config.scoring.clone()))
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &FreshnessOrchestrator {
        &self.orchestrator
    }

    /// Refresh stale sources, then read, score and paginate.
    ///
    /// Sources that fail to refresh are listed in the response's `failures`;
    /// whatever the store holds for them is still served.
    pub async fn get_feed(&self, query: FeedQuery) -> Result<FeedResponse> {
        let config = self.resolver.effective_config().await?;
        let sources = self.resolver.effective_sources().await?;
        let time_range = query.time_range.unwrap_or(config.default_time_range);

        let targets: Vec<ResolvedSource> = sources
            .enabled()
            .filter(|s| query.categories.is_empty() || query.categories.contains(&s.category()))
            .cloned()
            .collect();
        let report = self.orchestrator.ensure_fresh(&targets).await;

        let ids: Vec<String> = targets.iter().map(|s| s.id().to_string()).collect();
        let items = self
            .orchestrator
            .store()
            .query_by_time_range(&ids, time_range, self.query_window)
            .await?;

        let now = Utc::now();
        let item_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let velocities = match self.orchestrator.velocity().bulk_velocities(&item_ids, now).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Velocity lookup failed, scoring without it");
                HashMap::new()
            }
        };

        let by_id: HashMap<&str, &ResolvedSource> = targets.iter().map(|s| (s.id(), s)).collect();
        let categories: HashMap<String, Category> = targets
            .iter()
            .map(|s| (s.id().to_string(), s.category()))
            .collect();
        let boost = KeywordMatcher::new(&config.boost_keywords);
        let ctx = ScoringContext {
            priorities: &config.priorities,
            categories: &categories,
            velocities: &velocities,
            boost: &boost,
            now,
        };
        let ranked = self.scorer.rank(items, &ctx);
        let total_items = ranked.len();

        let mut category_counts: BTreeMap<String, usize> = targets
            .iter()
            .map(|s| (s.category().to_string(), 0))
            .collect();
        let page: Vec<FeedItem> = ranked
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .filter_map(|item| {
                let source = by_id.get(item.source_id.as_str())?;
                *category_counts.entry(source.category().to_string()).or_default() += 1;
                Some(FeedItem::new(item, &source.config.name, source.category()))
            })
            .collect();

        let failures = report
            .failures
            .into_iter()
            .map(|f| FeedFailure {
                source: f.source_name,
                error: f.error,
            })
            .collect();

        debug!(
            time_range = %time_range,
            sources = targets.len(),
            total = total_items,
            returned = page.len(),
            "Feed built"
        );

        Ok(FeedResponse {
            meta: FeedMeta {
                total_items,
                returned_items: page.len(),
                offset: query.offset,
                limit: query.limit,
                time_range,
                categories: category_counts,
            },
            items: page,
            failures,
        })
    }
}
