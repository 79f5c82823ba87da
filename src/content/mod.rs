//! Normalized content items and the shared content store.

mod repository;
pub mod sentiment;
mod types;

pub use repository::{
    per_source_cap, ContentStore, UpsertSummary, DEFAULT_BATCH_SIZE, DEFAULT_PER_SOURCE_FLOOR,
};
pub use types::{content_id, ContentItem, Engagement, Sentiment, TimeRange, MAX_DESCRIPTION_LENGTH};
