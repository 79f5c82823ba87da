//! Helpers shared by all source adapters.

mod normalize;
pub mod relevance;
pub mod retry;

pub use normalize::{
    clean_description, dedup_by_id, filter_by_time_range, strip_html, truncate_description,
};
pub use relevance::KeywordMatcher;
pub use retry::{retry_with_backoff, RetryPolicy};
