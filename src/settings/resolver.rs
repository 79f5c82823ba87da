//! Effective configuration: registry defaults merged with stored settings
//! and per-source overrides.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::cache::MemoryCache;
use super::repository::SettingsRepository;
use crate::content::TimeRange;
use crate::db::Database;
use crate::sources::{
    static_sources, validate_url, Category, CustomSourceConfig, ResolvedSource, SourceConfig,
    SourceRecord, SourceRepository, PRIORITY_RANGE,
};
use crate::{Result, TrendError};

pub const THEME: &str = "theme";
pub const DEFAULT_TIME_RANGE: &str = "default_time_range";
pub const BOOST_KEYWORDS: &str = "boost_keywords";
pub const CUSTOM_SOURCES: &str = "custom_sources";
pub const DELETED_SOURCES: &str = "deleted_sources";

/// Every writable settings key.
pub const SETTING_KEYS: [&str; 5] = [
    THEME,
    DEFAULT_TIME_RANGE,
    BOOST_KEYWORDS,
    CUSTOM_SOURCES,
    DELETED_SOURCES,
];

const CONFIG_PREFIX: &str = "config:";
const EFFECTIVE_CONFIG_KEY: &str = "config:effective";
const EFFECTIVE_SOURCES_KEY: &str = "config:sources";
const SETTING_PREFIX: &str = "setting:";

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Light, Theme::Dark, Theme::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TrendError::Validation(format!("invalid theme: {s}")))
    }
}

/// Snapshot of every setting that shapes a feed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub theme: Theme,
    pub default_time_range: TimeRange,
    pub enabled_source_ids: BTreeSet<String>,
    pub priorities: BTreeMap<String, u8>,
    pub boost_keywords: Vec<String>,
    pub custom_sources: Vec<CustomSourceConfig>,
    pub deleted_sources: Vec<String>,
}

/// Resolved sources plus the categories that have an enabled source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSourceList {
    pub sources: Vec<ResolvedSource>,
    pub enabled_categories: Vec<Category>,
}

impl EffectiveSourceList {
    pub fn enabled(&self) -> impl Iterator<Item = &ResolvedSource> {
        self.sources.iter().filter(|s| s.is_enabled)
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedSource> {
        self.sources.iter().find(|s| s.id() == id)
    }
}

fn setting_or<T: DeserializeOwned>(settings: &HashMap<String, Value>, key: &str, default: T) -> T {
    settings
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(default)
}

/// Check that `value` has the shape `key` expects.
pub fn validate_setting(key: &str, value: &Value) -> Result<()> {
    let shape = |expected: &str| TrendError::Validation(format!("{key} must be {expected}"));
    match key {
        THEME => {
            let s = value.as_str().ok_or_else(|| shape("a string"))?;
            s.parse::<Theme>().map(|_| ())
        }
        DEFAULT_TIME_RANGE => {
            let s = value.as_str().ok_or_else(|| shape("a string"))?;
            s.parse::<TimeRange>().map(|_| ())
        }
        BOOST_KEYWORDS | DELETED_SOURCES => serde_json::from_value::<Vec<String>>(value.clone())
            .map(|_| ())
            .map_err(|_| shape("a list of strings")),
        CUSTOM_SOURCES => serde_json::from_value::<Vec<CustomSourceConfig>>(value.clone())
            .map(|_| ())
            .map_err(|_| shape("a list of custom sources")),
        _ => Err(TrendError::NotFound(format!("setting {key}"))),
    }
}

/// Resolves settings and sources, caching the results until a write.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    db: Database,
    cache: MemoryCache,
    registry: Vec<SourceConfig>,
}

impl ConfigResolver {
    /// Resolver over the built-in source registry.
    pub fn new(db: Database, cache: MemoryCache) -> Self {
        Self::with_registry(db, cache, static_sources())
    }

    pub fn with_registry(db: Database, cache: MemoryCache, registry: Vec<SourceConfig>) -> Self {
        Self { db, cache, registry }
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    /// Current effective configuration.
    pub async fn effective_config(&self) -> Result<Arc<EffectiveConfig>> {
        if let Some(config) = self.cache.get::<EffectiveConfig>(EFFECTIVE_CONFIG_KEY) {
            return Ok(config);
        }
        Ok(self.load().await?.0)
    }

    /// Current resolved sources.
    pub async fn effective_sources(&self) -> Result<Arc<EffectiveSourceList>> {
        if let Some(sources) = self.cache.get::<EffectiveSourceList>(EFFECTIVE_SOURCES_KEY) {
            return Ok(sources);
        }
        Ok(self.load().await?.1)
    }

    async fn load(&self) -> Result<(Arc<EffectiveConfig>, Arc<EffectiveSourceList>)> {
        let generation = self.cache.generation();
        self.load_at(generation).await
    }

    /// Build both snapshots from one settings read and one sources read.
    ///
    /// They are cached only if no write invalidated the cache after
    /// `generation` was taken.
    async fn load_at(
        &self,
        generation: u64,
    ) -> Result<(Arc<EffectiveConfig>, Arc<EffectiveSourceList>)> {
        let settings = SettingsRepository::new(self.db.pool()).get_all().await?;

        let custom_sources: Vec<CustomSourceConfig> = setting_or(&settings, CUSTOM_SOURCES, Vec::new());
        let deleted_sources: Vec<String> = setting_or(&settings, DELETED_SOURCES, Vec::new());

        let mut candidates: Vec<(SourceConfig, bool)> = self
            .registry
            .iter()
            .filter(|s| !deleted_sources.contains(&s.id))
            .map(|s| (s.clone(), false))
            .collect();
        candidates.extend(custom_sources.iter().map(|c| (c.to_source_config(), true)));

        let repo = SourceRepository::new(self.db.pool());
        let records: Vec<SourceRecord> = candidates
            .iter()
            .map(|(config, is_custom)| SourceRecord::from_config(config, *is_custom))
            .collect();
        repo.sync(&records).await?;
        let overrides: HashMap<String, SourceRecord> = repo
            .list()
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let sources: Vec<ResolvedSource> = candidates
            .into_iter()
            .map(|(config, is_custom)| {
                let record = overrides.get(&config.id);
                ResolvedSource {
                    is_enabled: record.and_then(|r| r.enabled).unwrap_or(config.enabled),
                    effective_priority: record
                        .and_then(SourceRecord::priority_override)
                        .unwrap_or(config.default_priority),
                    is_custom,
                    config,
                }
            })
            .collect();

        let enabled_categories: BTreeSet<Category> =
            sources.iter().filter(|s| s.is_enabled).map(|s| s.category()).collect();

        let config = EffectiveConfig {
            theme: setting_or(&settings, THEME, Theme::default()),
            default_time_range: setting_or(&settings, DEFAULT_TIME_RANGE, TimeRange::Day),
            enabled_source_ids: sources
                .iter()
                .filter(|s| s.is_enabled)
                .map(|s| s.id().to_string())
                .collect(),
            priorities: sources
                .iter()
                .map(|s| (s.id().to_string(), s.effective_priority))
                .collect(),
            boost_keywords: setting_or(&settings, BOOST_KEYWORDS, Vec::new()),
            custom_sources,
            deleted_sources,
        };

        debug!(
            sources = sources.len(),
            enabled = config.enabled_source_ids.len(),
            "Resolved effective configuration"
        );
        let config = self.cache.set_if_current(EFFECTIVE_CONFIG_KEY, config, generation);
        let sources = self.cache.set_if_current(
            EFFECTIVE_SOURCES_KEY,
            EffectiveSourceList {
                sources,
                enabled_categories: enabled_categories.into_iter().collect(),
            },
            generation,
        );
        Ok((config, sources))
    }

    /// A stored setting decoded as `T`, or `default` when unset or malformed.
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        let cache_key = format!("{SETTING_PREFIX}{key}");
        let value = match self.cache.get::<Option<Value>>(&cache_key) {
            Some(value) => value,
            None => {
                let generation = self.cache.generation();
                let value = SettingsRepository::new(self.db.pool()).get(key).await?;
                self.cache.set_if_current(&cache_key, value, generation)
            }
        };
        Ok((*value)
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default))
    }

    /// Validate and store a setting, then invalidate everything derived from it.
    pub async fn update_setting(&self, key: &str, value: Value) -> Result<()> {
        validate_setting(key, &value)?;
        if key == CUSTOM_SOURCES {
            let customs: Vec<CustomSourceConfig> = serde_json::from_value(value.clone())?;
            self.check_custom_sources(&customs)?;
        }
        SettingsRepository::new(self.db.pool()).set(key, &value).await?;
        self.invalidate_setting(key);
        info!(key = %key, "Setting updated");
        Ok(())
    }

    /// Rules every stored custom source list must satisfy.
    fn check_custom_sources(&self, customs: &[CustomSourceConfig]) -> Result<()> {
        let mut seen = HashSet::new();
        for custom in customs {
            if !custom.id.starts_with(CustomSourceConfig::ID_PREFIX) {
                return Err(TrendError::Validation(format!(
                    "custom source id {} must start with {}",
                    custom.id,
                    CustomSourceConfig::ID_PREFIX
                )));
            }
            if custom.name.trim().is_empty() {
                return Err(TrendError::Validation("name must not be empty".into()));
            }
            validate_url(custom.feed_url.trim())?;
            if let Some(p) = custom.priority.filter(|p| !PRIORITY_RANGE.contains(p)) {
                return Err(TrendError::Validation(format!("invalid priority: {p}")));
            }
            if self.registry.iter().any(|s| s.id == custom.id) || !seen.insert(custom.id.as_str()) {
                return Err(TrendError::Validation(format!("source {} already exists", custom.id)));
            }
        }
        Ok(())
    }

    fn invalidate_setting(&self, key: &str) {
        self.cache.invalidate(&format!("{SETTING_PREFIX}{key}"));
        self.cache.invalidate_pattern(CONFIG_PREFIX);
    }

    /// Override a source's enabled flag and/or priority.
    pub async fn set_source_override(
        &self,
        id: &str,
        enabled: Option<bool>,
        priority: Option<u8>,
    ) -> Result<ResolvedSource> {
        if let Some(p) = priority {
            if !PRIORITY_RANGE.contains(&p) {
                return Err(TrendError::Validation(format!(
                    "priority must be between {} and {}",
                    PRIORITY_RANGE.start(),
                    PRIORITY_RANGE.end()
                )));
            }
        }
        if self.effective_sources().await?.get(id).is_none() {
            return Err(TrendError::NotFound(format!("source {id}")));
        }

        SourceRepository::new(self.db.pool())
            .set_override(id, enabled, priority)
            .await?;
        self.cache.invalidate_pattern(CONFIG_PREFIX);
        info!(source = %id, ?enabled, ?priority, "Source override updated");

        self.effective_sources()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| TrendError::NotFound(format!("source {id}")))
    }

    /// Add a user feed. The id is derived from the name and must be unused.
    pub async fn add_custom_source(
        &self,
        name: &str,
        feed_url: &str,
        category: Category,
        priority: Option<u8>,
    ) -> Result<CustomSourceConfig> {
        let custom = CustomSourceConfig::new(name, feed_url, category, priority);
        let config = self.effective_config().await?;
        let mut customs = config.custom_sources.clone();
        customs.push(custom.clone());
        self.check_custom_sources(&customs)?;
        SettingsRepository::new(self.db.pool())
            .set(CUSTOM_SOURCES, &serde_json::to_value(&customs)?)
            .await?;
        SourceRepository::new(self.db.pool())
            .sync(&[SourceRecord::from_config(&custom.to_source_config(), true)])
            .await?;
        self.invalidate_setting(CUSTOM_SOURCES);

        info!(source = %custom.id, url = %custom.feed_url, "Custom source added");
        Ok(custom)
    }

    /// Remove a source.
    ///
    /// Custom sources are dropped together with their cached items. Static
    /// sources are hidden until [`restore_source`](Self::restore_source).
    pub async fn delete_source(&self, id: &str) -> Result<()> {
        let config = self.effective_config().await?;
        let settings = SettingsRepository::new(self.db.pool());

        if config.custom_sources.iter().any(|c| c.id == id) {
            let customs: Vec<&CustomSourceConfig> =
                config.custom_sources.iter().filter(|c| c.id != id).collect();
            settings.set(CUSTOM_SOURCES, &serde_json::to_value(&customs)?).await?;
            SourceRepository::new(self.db.pool()).remove(id).await?;
            self.invalidate_setting(CUSTOM_SOURCES);
            info!(source = %id, "Custom source deleted");
            return Ok(());
        }

        if self.registry.iter().any(|s| s.id == id) && !config.deleted_sources.iter().any(|d| d == id) {
            let mut deleted = config.deleted_sources.clone();
            deleted.push(id.to_string());
            settings.set(DELETED_SOURCES, &serde_json::to_value(&deleted)?).await?;
            self.invalidate_setting(DELETED_SOURCES);
            info!(source = %id, "Built-in source hidden");
            return Ok(());
        }

        Err(TrendError::NotFound(format!("source {id}")))
    }

    /// Bring back a hidden built-in source.
    pub async fn restore_source(&self, id: &str) -> Result<()> {
        let config = self.effective_config().await?;
        if !config.deleted_sources.iter().any(|d| d == id) {
            return Err(TrendError::NotFound(format!("deleted source {id}")));
        }
        let deleted: Vec<&String> = config.deleted_sources.iter().filter(|d| *d != id).collect();
        SettingsRepository::new(self.db.pool())
            .set(DELETED_SOURCES, &serde_json::to_value(&deleted)?)
            .await?;
        self.invalidate_setting(DELETED_SOURCES);
        info!(source = %id, "Built-in source restored");
        Ok(())
    }
}
