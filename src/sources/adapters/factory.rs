//! Maps a resolved source to its adapter.

use std::time::Duration;

use tracing::{debug, info};

use super::{
    FeedAdapter, GitHubTrendingAdapter, HackerNewsAdapter, HuggingFaceAdapter, MediumAdapter,
    ScrapeAdapter, SourceAdapter,
};
use crate::config::FetchConfig;
use crate::sources::http::HttpFetcher;
use crate::sources::registry::{GITHUB_TRENDING, HACKER_NEWS, HUGGINGFACE_MODELS, MEDIUM_PREFIX};
use crate::sources::types::{FetchMethod, ResolvedSource};

/// Builds adapters for sources.
///
/// `None` means the source is skipped for this pass: it is disabled, its
/// method/id pair has no adapter, or it needs an API key that is not set.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, source: &ResolvedSource) -> Option<Box<dyn SourceAdapter>>;
}

/// Settings for the Medium enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// Items enriched per call.
    pub limit: usize,
    /// Pause between page requests.
    pub delay: Duration,
    /// Deadline for the whole call, counted from its start.
    pub budget: Duration,
}

impl From<&FetchConfig> for EnrichmentSettings {
    fn from(config: &FetchConfig) -> Self {
        let cap = config.source_timeout_secs.saturating_mul(750);
        Self {
            limit: config.enrichment_limit,
            delay: Duration::from_millis(config.enrichment_delay_ms),
            budget: Duration::from_millis(config.enrichment_budget_ms.min(cap)),
        }
    }
}

/// Factory for the built-in adapters.
#[derive(Debug, Clone)]
pub struct DefaultAdapterFactory {
    http: HttpFetcher,
    enrichment: EnrichmentSettings,
}

impl DefaultAdapterFactory {
    pub fn new(http: HttpFetcher, enrichment: EnrichmentSettings) -> Self {
        Self { http, enrichment }
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn create(&self, source: &ResolvedSource) -> Option<Box<dyn SourceAdapter>> {
        let config = &source.config;
        if !source.is_enabled {
            debug!(source = %config.id, "Source disabled, no adapter");
            return None;
        }

        let api_key = config.api_key();
        if config.requires_key && api_key.is_none() {
            info!(
                source = %config.id,
                env = config.api_key_env_var.as_deref().unwrap_or(""),
                "API key not set, skipping source"
            );
            return None;
        }

        let http = self.http.clone();
        let adapter: Box<dyn SourceAdapter> = match config.method {
            _ if source.is_custom => Box::new(FeedAdapter::new(config.clone(), http)),
            FetchMethod::Feed if config.id.starts_with(MEDIUM_PREFIX) => Box::new(MediumAdapter::new(
                config.clone(),
                http,
                self.enrichment,
            )),
            FetchMethod::Feed => Box::new(FeedAdapter::new(config.clone(), http)),
            FetchMethod::Scrape => Box::new(ScrapeAdapter::new(config.clone(), http)),
            FetchMethod::Api => match config.id.as_str() {
                HACKER_NEWS => Box::new(HackerNewsAdapter::new(config.clone(), http)),
                GITHUB_TRENDING => Box::new(GitHubTrendingAdapter::new(config.clone(), http, api_key)),
                HUGGINGFACE_MODELS => Box::new(HuggingFaceAdapter::new(config.clone(), http, api_key)),
                other => {
                    info!(source = %other, "No API adapter for source, skipping");
                    return None;
                }
            },
        };
        Some(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::registry::static_sources;
    use crate::sources::{Category, CustomSourceConfig, SourceConfig};

    fn factory() -> DefaultAdapterFactory {
        let config = FetchConfig::default();
        DefaultAdapterFactory::new(HttpFetcher::new(&config).unwrap(), EnrichmentSettings::from(&config))
    }

    fn resolved(config: SourceConfig, is_enabled: bool, is_custom: bool) -> ResolvedSource {
        ResolvedSource {
            effective_priority: config.default_priority,
            config,
            is_enabled,
            is_custom,
        }
    }

    #[test]
    fn test_routes_every_static_source() {
        let f = factory();
        for source in static_sources() {
            if source.requires_key {
                continue;
            }
            let id = source.id.clone();
            let adapter = f.create(&resolved(source, true, false));
            assert_eq!(adapter.map(|a| a.source_id().to_string()), Some(id));
        }
    }

    #[test]
    fn test_disabled_source_has_no_adapter() {
        let source = SourceConfig::feed("a", "A", Category::News, "https://a", "https://a/rss");
        assert!(factory().create(&resolved(source, false, false)).is_none());
    }

    #[test]
    fn test_unroutable_api_source() {
        let source = SourceConfig::endpoint("mystery-api", "?", Category::News, "https://m", FetchMethod::Api);
        assert!(factory().create(&resolved(source, true, false)).is_none());
    }

    #[test]
    fn test_missing_required_key() {
        let source = SourceConfig::endpoint(HACKER_NEWS, "HN", Category::Community, "https://h", FetchMethod::Api)
            .with_api_key("TRENDFEED_FACTORY_TEST_UNSET_KEY", true);
        assert!(factory().create(&resolved(source, true, false)).is_none());
    }

    #[test]
    fn test_custom_source_uses_feed_adapter() {
        let custom = CustomSourceConfig::new("My Blog", "https://blog.example.com/rss", Category::Newsletters, None);
        let adapter = factory()
            .create(&resolved(custom.to_source_config(), true, true))
            .unwrap();
        assert_eq!(adapter.source_id(), "custom-my-blog");
    }

    #[test]
    fn test_enrichment_budget_stays_inside_source_timeout() {
        let settings = EnrichmentSettings::from(&FetchConfig::default());
        assert_eq!(settings.budget, Duration::from_secs(6));

        let config = FetchConfig {
            source_timeout_secs: 4,
            ..FetchConfig::default()
        };
        assert_eq!(EnrichmentSettings::from(&config).budget, Duration::from_secs(3));
    }
}
