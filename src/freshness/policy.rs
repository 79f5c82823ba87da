//! Per-category staleness TTLs.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::{FreshnessConfig, MAX_TTL_SECS};
use crate::sources::Category;

/// Built-in TTL for a category.
pub fn default_ttl(category: Category) -> Duration {
    match category {
        Category::Community => Duration::minutes(5),
        Category::Social | Category::News | Category::AiLabs | Category::DevPlatforms => {
            Duration::minutes(15)
        }
        Category::Newsletters => Duration::minutes(30),
        Category::Leaderboards => Duration::minutes(60),
    }
}

/// Category to TTL table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttls: HashMap<Category, Duration>,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            ttls: Category::ALL.into_iter().map(|c| (c, default_ttl(c))).collect(),
        }
    }
}

impl FreshnessPolicy {
    /// Built-in TTLs with overrides from configuration.
    ///
    /// Unknown category names are logged and ignored. TTLs above
    /// [`MAX_TTL_SECS`] are clamped to it.
    pub fn from_config(config: &FreshnessConfig) -> Self {
        let mut policy = Self::default();
        for (name, secs) in &config.ttl_secs {
            match name.parse::<Category>() {
                Ok(category) => {
                    if *secs > MAX_TTL_SECS {
                        warn!(category = %name, secs, max = MAX_TTL_SECS, "Clamping TTL");
                    }
                    let secs = (*secs).min(MAX_TTL_SECS) as i64;
                    policy.ttls.insert(category, Duration::seconds(secs));
                }
                Err(_) => warn!(category = %name, "Ignoring TTL for unknown category"),
            }
        }
        policy
    }

    pub fn ttl(&self, category: Category) -> Duration {
        self.ttls
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_ttl(category))
    }

    /// Whether a source last fetched at `last_fetched` needs a refresh.
    ///
    /// A source never fetched is always stale.
    pub fn is_stale(
        &self,
        category: Category,
        last_fetched: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match last_fetched {
            None => true,
            Some(at) => now - at >= self.ttl(category),
        }
    }
}
