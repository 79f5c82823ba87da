//! Source definitions and fetch options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::content::TimeRange;
use crate::ingest::RetryPolicy;
use crate::TrendError;

/// Default priority for sources that do not declare one.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Valid priority range.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Source category. Drives staleness TTL and scoring weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Community,
    Social,
    News,
    AiLabs,
    DevPlatforms,
    Newsletters,
    Leaderboards,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Community,
        Category::Social,
        Category::News,
        Category::AiLabs,
        Category::DevPlatforms,
        Category::Newsletters,
        Category::Leaderboards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Community => "community",
            Category::Social => "social",
            Category::News => "news",
            Category::AiLabs => "ai-labs",
            Category::DevPlatforms => "dev-platforms",
            Category::Newsletters => "newsletters",
            Category::Leaderboards => "leaderboards",
        }
    }

    pub fn valid_values() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TrendError::Validation(format!("invalid category: {s}")))
    }
}

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Feed,
    Api,
    Scrape,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::Feed => "feed",
            FetchMethod::Api => "api",
            FetchMethod::Scrape => "scrape",
        }
    }
}

/// Static definition of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub category: Category,
    /// Homepage or API endpoint.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    pub method: FetchMethod,
    /// Enabled unless overridden.
    pub enabled: bool,
    #[serde(default)]
    pub requires_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
    pub default_priority: u8,
    /// Keep only items matching the topic keywords.
    #[serde(default)]
    pub relevance_filter: bool,
}

impl SourceConfig {
    /// Feed-based source.
    pub fn feed(id: &str, name: &str, category: Category, url: &str, feed_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            url: url.to_string(),
            feed_url: Some(feed_url.to_string()),
            method: FetchMethod::Feed,
            enabled: true,
            requires_key: false,
            api_key_env_var: None,
            default_priority: DEFAULT_PRIORITY,
            relevance_filter: false,
        }
    }

    /// API- or scrape-based source.
    pub fn endpoint(
        id: &str,
        name: &str,
        category: Category,
        url: &str,
        method: FetchMethod,
    ) -> Self {
        Self {
            feed_url: None,
            method,
            ..Self::feed(id, name, category, url, "")
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn with_relevance_filter(mut self) -> Self {
        self.relevance_filter = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Read an API key from `env_var`. `required` makes the source unroutable
    /// without it.
    pub fn with_api_key(mut self, env_var: &str, required: bool) -> Self {
        self.api_key_env_var = Some(env_var.to_string());
        self.requires_key = required;
        self
    }

    /// The API key from the environment, if set and non-blank.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env_var.as_deref()?;
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// URL the feed adapter reads; the feed URL when set, else `url`.
    pub fn fetch_url(&self) -> &str {
        self.feed_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.url)
    }
}

/// A user-added feed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSourceConfig {
    pub id: String,
    pub name: String,
    pub feed_url: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl CustomSourceConfig {
    /// Prefix for every custom source id.
    pub const ID_PREFIX: &'static str = "custom-";

    /// Build a custom source, deriving its id from the name.
    pub fn new(name: &str, feed_url: &str, category: Category, priority: Option<u8>) -> Self {
        Self {
            id: format!("{}{}", Self::ID_PREFIX, slugify(name)),
            name: name.trim().to_string(),
            feed_url: feed_url.trim().to_string(),
            category,
            priority,
        }
    }

    pub fn to_source_config(&self) -> SourceConfig {
        let mut config = SourceConfig::feed(
            &self.id,
            &self.name,
            self.category,
            &self.feed_url,
            &self.feed_url,
        );
        config.default_priority = self.priority.unwrap_or(DEFAULT_PRIORITY);
        config
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "source".to_string()
    } else {
        slug.to_string()
    }
}

/// A source with its overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    #[serde(flatten)]
    pub config: SourceConfig,
    pub is_enabled: bool,
    pub effective_priority: u8,
    pub is_custom: bool,
}

impl ResolvedSource {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn category(&self) -> Category {
        self.config.category
    }
}

/// Options passed to an adapter fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Drop items older than this range. `None` keeps everything.
    pub time_range: Option<TimeRange>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl FetchOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay_ms)
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            time_range: None,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}
