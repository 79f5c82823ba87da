//! Configuration module for trendfeed.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::{Result, TrendError};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/trendfeed.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/trendfeed.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Deadline for one adapter call inside a freshness pass.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
    /// HTTP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
    /// Attempts per upstream request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// How many items an enrichment adapter scrapes per pass.
    #[serde(default = "default_enrichment_limit")]
    pub enrichment_limit: usize,
    /// Pause between enrichment requests in milliseconds.
    #[serde(default = "default_enrichment_delay_ms")]
    pub enrichment_delay_ms: u64,
    /// Time an enrichment adapter may spend per call, measured from the start
    /// of the call. Capped at three quarters of `source_timeout_secs`.
    #[serde(default = "default_enrichment_budget_ms")]
    pub enrichment_budget_ms: u64,
}

fn default_source_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    8
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_body_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "trendfeed/0.1 (+https://github.com/trendfeed/trendfeed)".to_string()
}

fn default_enrichment_limit() -> usize {
    5
}

fn default_enrichment_delay_ms() -> u64 {
    1000
}

fn default_enrichment_budget_ms() -> u64 {
    6000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
            enrichment_limit: default_enrichment_limit(),
            enrichment_delay_ms: default_enrichment_delay_ms(),
            enrichment_budget_ms: default_enrichment_budget_ms(),
        }
    }
}

/// Longest TTL a category may be configured with (30 days).
pub const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

/// Freshness policy overrides.
///
/// Keys are category names (`community`, `ai-labs`, ...); values are TTLs in
/// seconds. Categories not listed keep their built-in TTL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreshnessConfig {
    /// Per-category TTL overrides in seconds.
    #[serde(default)]
    pub ttl_secs: HashMap<String, u64>,
}

/// Content store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Items per upsert transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Minimum per-source cap for time-range queries.
    #[serde(default = "default_per_source_floor")]
    pub per_source_floor: usize,
    /// Items pulled from the store before scoring and pagination.
    #[serde(default = "default_query_window")]
    pub query_window: usize,
    /// Items fetched longer ago than this are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_batch_size() -> usize {
    50
}

fn default_per_source_floor() -> usize {
    5
}

fn default_query_window() -> usize {
    500
}

fn default_retention_days() -> u32 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            per_source_floor: default_per_source_floor(),
            query_window: default_query_window(),
            retention_days: default_retention_days(),
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background refresh/sweep loop runs.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// Seconds between background freshness passes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Seconds between retention sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            refresh_interval_secs: default_refresh_interval(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Trending score coefficients.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Hours after which recency weight halves.
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    /// Bonus added per matched boost keyword.
    #[serde(default = "default_boost_bonus")]
    pub boost_bonus: f64,
    /// Weight of log-scaled engagement.
    #[serde(default = "default_engagement_weight")]
    pub engagement_weight: f64,
    /// Weight of log-scaled velocity.
    #[serde(default = "default_velocity_weight")]
    pub velocity_weight: f64,
    /// Per-category multipliers (missing categories use 1.0).
    #[serde(default)]
    pub category_weights: HashMap<String, f64>,
}

fn default_half_life_hours() -> f64 {
    24.0
}

fn default_boost_bonus() -> f64 {
    25.0
}

fn default_engagement_weight() -> f64 {
    0.15
}

fn default_velocity_weight() -> f64 {
    0.1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            boost_bonus: default_boost_bonus(),
            engagement_weight: default_engagement_weight(),
            velocity_weight: default_velocity_weight(),
            category_weights: HashMap::new(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Allowed CORS origins (empty = permissive).
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Requests per minute per client IP.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

fn default_rate_limit() -> u32 {
    120
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Upstream fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Freshness TTL overrides.
    #[serde(default)]
    pub freshness: FreshnessConfig,
    /// Content store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Background scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Trending score coefficients.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TrendError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TrendError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TRENDFEED_DATABASE_PATH`: SQLite database path
    /// - `TRENDFEED_LOG_LEVEL`: log level
    /// - `TRENDFEED_PORT`: HTTP port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TRENDFEED_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("TRENDFEED_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(port) = std::env::var("TRENDFEED_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid TRENDFEED_PORT"),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.source_timeout_secs == 0 || self.fetch.request_timeout_secs == 0 {
            return Err(TrendError::Config(
                "fetch timeouts must be greater than zero".to_string(),
            ));
        }
        if let Some((category, secs)) = self
            .freshness
            .ttl_secs
            .iter()
            .find(|(_, secs)| **secs > MAX_TTL_SECS)
        {
            return Err(TrendError::Config(format!(
                "freshness.ttl_secs.{category} = {secs} exceeds {MAX_TTL_SECS}"
            )));
        }
        if self.store.batch_size == 0 {
            return Err(TrendError::Config(
                "store.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.store.retention_days == 0 {
            return Err(TrendError::Config(
                "store.retention_days must be greater than zero".to_string(),
            ));
        }
        let scoring = &self.scoring;
        if !(scoring.half_life_hours > 0.0) {
            return Err(TrendError::Config(
                "scoring.half_life_hours must be positive".to_string(),
            ));
        }
        if !(scoring.boost_bonus > 0.0) {
            return Err(TrendError::Config(
                "scoring.boost_bonus must be positive".to_string(),
            ));
        }
        if !(scoring.engagement_weight >= 0.0) || !(scoring.velocity_weight >= 0.0) {
            return Err(TrendError::Config(
                "scoring engagement and velocity weights must not be negative".to_string(),
            ));
        }
        if let Some((category, weight)) = scoring
            .category_weights
            .iter()
            .find(|(_, w)| !(**w > 0.0))
        {
            return Err(TrendError::Config(format!(
                "scoring.category_weights.{category} = {weight} must be positive"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "data/trendfeed.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/trendfeed.log");

        assert_eq!(config.fetch.source_timeout_secs, 10);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.retry_delay_ms, 1000);
        assert_eq!(config.fetch.enrichment_limit, 5);

        assert!(config.freshness.ttl_secs.is_empty());

        assert_eq!(config.store.batch_size, 50);
        assert_eq!(config.store.per_source_floor, 5);
        assert_eq!(config.store.retention_days, 30);

        assert!(config.scheduler.enabled);
        assert_eq!(config.scoring.half_life_hours, 24.0);
        assert_eq!(config.web.rate_limit_per_minute, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[database]
path = "custom/feed.db"

[logging]
level = "debug"
file = "custom/app.log"

[fetch]
source_timeout_secs = 4
max_retries = 1
retry_delay_ms = 250
enrichment_limit = 2

[freshness.ttl_secs]
community = 60
leaderboards = 7200

[store]
batch_size = 10
per_source_floor = 3
retention_days = 7

[scheduler]
enabled = false

[scoring]
half_life_hours = 12.0
boost_bonus = 40.0

[scoring.category_weights]
ai-labs = 1.2

[web]
cors_origins = ["http://localhost:5173"]
rate_limit_per_minute = 30
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, "custom/feed.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.fetch.source_timeout_secs, 4);
        assert_eq!(config.fetch.max_retries, 1);
        assert_eq!(config.fetch.retry_delay_ms, 250);
        assert_eq!(config.fetch.enrichment_limit, 2);
        assert_eq!(config.freshness.ttl_secs.get("community"), Some(&60));
        assert_eq!(config.freshness.ttl_secs.get("leaderboards"), Some(&7200));
        assert_eq!(config.store.batch_size, 10);
        assert_eq!(config.store.per_source_floor, 3);
        assert_eq!(config.store.retention_days, 7);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scoring.half_life_hours, 12.0);
        assert_eq!(config.scoring.boost_bonus, 40.0);
        assert_eq!(config.scoring.category_weights.get("ai-labs"), Some(&1.2));
        assert_eq!(config.web.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.web.rate_limit_per_minute, 30);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.batch_size, 50);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("[server\nport = ");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("config parse error"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("/nonexistent/trendfeed.toml");
        assert!(matches!(result, Err(TrendError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.store.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.fetch.source_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_boost_bonus() {
        for bonus in ["0.0", "-5.0"] {
            let config = Config::parse(&format!("[scoring]\nboost_bonus = {bonus}")).unwrap();
            assert!(matches!(config.validate(), Err(TrendError::Config(_))), "{bonus}");
        }
    }

    #[test]
    fn test_validate_rejects_negative_weights() {
        let config = Config::parse("[scoring]\nengagement_weight = -0.1").unwrap();
        assert!(config.validate().is_err());

        let config = Config::parse("[scoring]\nvelocity_weight = -1.0").unwrap();
        assert!(config.validate().is_err());

        let config = Config::parse("[scoring.category_weights]\nnews = -2.0").unwrap();
        assert!(config.validate().is_err());

        let config = Config::parse("[scoring]\nengagement_weight = 0.0\nvelocity_weight = 0.0").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_huge_ttl() {
        let config = Config::parse("[freshness.ttl_secs]\nnews = 99999999999").unwrap();
        assert!(config.validate().is_err());

        let config = Config::parse("[freshness.ttl_secs]\nnews = 3600").unwrap();
        assert!(config.validate().is_ok());
    }
}
