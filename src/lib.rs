//! trendfeed - trending content aggregator
//!
//! Pulls items from feeds, APIs and scraped listings, keeps a freshness-aware
//! SQLite cache of them, and serves a ranked, time-filtered feed over HTTP.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod feed;
pub mod freshness;
pub mod ingest;
pub mod logging;
pub mod scheduler;
pub mod scoring;
pub mod settings;
pub mod sources;
pub mod velocity;
pub mod web;

pub use config::Config;
pub use content::{ContentItem, ContentStore, TimeRange};
pub use db::Database;
pub use error::{Result, TrendError};
pub use feed::{FeedQuery, FeedResponse, FeedService};
pub use freshness::{FreshnessOrchestrator, RefreshReport};
pub use scheduler::Scheduler;
pub use scoring::Scorer;
pub use settings::{ConfigResolver, MemoryCache};
pub use sources::{AdapterFactory, DefaultAdapterFactory, SourceAdapter};
pub use web::{AppState, WebServer};
