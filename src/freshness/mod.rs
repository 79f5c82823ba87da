//! Freshness orchestration.
//!
//! Decides which sources are stale, refreshes them concurrently and records
//! fetch times and source health.

mod orchestrator;
mod policy;
mod repository;
mod tasks;

pub use orchestrator::{
    FreshnessOrchestrator, FreshnessPartition, RefreshReport, SourceFailure, DEFAULT_FETCH_TIMEOUT,
};
pub use policy::{default_ttl, FreshnessPolicy};
pub use repository::{FreshnessRepository, HealthRepository, SourceHealth, EMPTY_RESULT};
pub use tasks::BackgroundTasks;
