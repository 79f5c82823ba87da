//! Source adapters: one per upstream format.
//!
//! Every adapter implements [`SourceAdapter`]. The orchestrator calls
//! [`SourceAdapter::try_fetch`] so it can tell failures apart for health
//! tracking; other callers use [`SourceAdapter::fetch`], which never fails.

mod factory;
mod feed;
mod github;
mod hacker_news;
mod hugging_face;
mod medium;
mod scrape;

pub use factory::{AdapterFactory, DefaultAdapterFactory, EnrichmentSettings};
pub use feed::{parse_feed, FeedAdapter};
pub use github::GitHubTrendingAdapter;
pub use hacker_news::HackerNewsAdapter;
pub use hugging_face::HuggingFaceAdapter;
pub use medium::{extract_clap_count, MediumAdapter};
pub use scrape::{parse_listing, ScrapeAdapter};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::types::{FetchOptions, SourceConfig};
use crate::content::ContentItem;
use crate::ingest::{dedup_by_id, filter_by_time_range, KeywordMatcher};
use crate::Result;

/// Fetches one source and maps it to content items.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Id of the source this adapter serves.
    fn source_id(&self) -> &str;

    /// Fetch, returning any upstream or parse error.
    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>>;

    /// Fetch, logging failures and returning an empty list instead.
    async fn fetch(&self, options: &FetchOptions) -> Vec<ContentItem> {
        match self.try_fetch(options).await {
            Ok(items) => items,
            Err(e) => {
                warn!(source = %self.source_id(), error = %e, "Fetch failed");
                Vec::new()
            }
        }
    }
}

/// Apply the relevance filter (when the source asks for it), the time-range
/// cutoff and dedup.
pub(crate) fn finish(
    source: &SourceConfig,
    items: Vec<ContentItem>,
    options: &FetchOptions,
) -> Vec<ContentItem> {
    let fetched = items.len();
    let items = if source.relevance_filter {
        let matcher = KeywordMatcher::ai_default();
        items
            .into_iter()
            .filter(|item| matcher.is_match(&item.search_text()))
            .collect()
    } else {
        items
    };
    let items = dedup_by_id(filter_by_time_range(items, options.time_range, Utc::now()));
    debug!(source = %source.id, fetched, kept = items.len(), "Adapter finished");
    items
}
