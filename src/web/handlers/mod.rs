//! API handlers.

pub mod feed;
pub mod settings;
pub mod sources;

pub use feed::*;
pub use settings::*;
pub use sources::*;

use crate::db::Database;
use crate::feed::FeedService;
use crate::settings::ConfigResolver;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub feed: FeedService,
}

impl AppState {
    pub fn new(db: Database, feed: FeedService) -> Self {
        Self { db, feed }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        self.feed.resolver()
    }
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
