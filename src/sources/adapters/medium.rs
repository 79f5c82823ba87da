//! Medium tag feeds, enriched with clap counts scraped from article pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use super::factory::EnrichmentSettings;
use super::feed::FeedAdapter;
use super::{finish, SourceAdapter};
use crate::content::{ContentItem, Engagement};
use crate::sources::http::HttpFetcher;
use crate::sources::types::{FetchOptions, SourceConfig};
use crate::Result;

static CLAP_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""clapCount"\s*:\s*(\d+)"#).expect("valid regex"));
static CLAP_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([km])?\s+claps?\b").expect("valid regex")
});

/// Feed adapter with a rate-limited second pass for claps.
///
/// Only the first `limit` items are enriched, one request at a time with
/// `delay` between requests, and only until `budget` has passed since the
/// call started. An item whose page fails or is not reached keeps no
/// engagement.
pub struct MediumAdapter {
    feed: FeedAdapter,
    http: HttpFetcher,
    settings: EnrichmentSettings,
}

impl MediumAdapter {
    pub fn new(source: SourceConfig, http: HttpFetcher, settings: EnrichmentSettings) -> Self {
        Self {
            feed: FeedAdapter::new(source, http.clone()),
            http,
            settings,
        }
    }

    async fn enrich(&self, items: &mut [ContentItem], deadline: Instant) {
        let source = &self.feed.source().id;
        for (i, item) in items.iter_mut().take(self.settings.limit).enumerate() {
            if i > 0 && !self.settings.delay.is_zero() {
                if Instant::now() + self.settings.delay >= deadline {
                    debug!(source = %source, attempted = i, "Enrichment budget spent");
                    return;
                }
                tokio::time::sleep(self.settings.delay).await;
            }
            if item.url.is_empty() {
                continue;
            }
            let page = match timeout_at(deadline, self.http.get_text(&item.url, None)).await {
                Ok(page) => page,
                Err(_) => {
                    debug!(source = %source, url = %item.url, attempted = i, "Enrichment budget spent");
                    return;
                }
            };
            match page {
                Ok(page) => {
                    if let Some(claps) = extract_clap_count(&page) {
                        item.engagement = Some(Engagement {
                            claps: Some(claps),
                            ..item.engagement.take().unwrap_or_default()
                        });
                    }
                }
                Err(e) => {
                    debug!(source = %source, url = %item.url, error = %e, "Clap enrichment failed");
                }
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for MediumAdapter {
    fn source_id(&self) -> &str {
        self.feed.source_id()
    }

    async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<ContentItem>> {
        let deadline = Instant::now() + self.settings.budget;
        let entries = self.feed.fetch_entries(options).await?;
        let mut items = finish(self.feed.source(), entries, options);
        self.enrich(&mut items, deadline).await;
        Ok(items)
    }
}

/// Read a clap count from an article page.
///
/// Prefers the embedded `clapCount` JSON field, then visible text such as
/// "1.2K claps".
pub fn extract_clap_count(html: &str) -> Option<u64> {
    if let Some(c) = CLAP_JSON.captures(html) {
        return c[1].parse().ok();
    }
    let c = CLAP_TEXT.captures(html)?;
    let value: f64 = c[1].parse().ok()?;
    let multiplier = match c.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_clap_count() {
        assert_eq!(extract_clap_count(r#"{"post":{"clapCount":1234}}"#), Some(1234));
        assert_eq!(extract_clap_count("<span>1.2K claps</span>"), Some(1200));
        assert_eq!(extract_clap_count("<span>87 claps</span>"), Some(87));
        assert_eq!(extract_clap_count("<p>no engagement here</p>"), None);
    }
}
