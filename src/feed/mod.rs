//! The ranked feed: request validation, assembly and response shape.

mod query;
mod response;
mod service;

pub use query::{FeedParams, FeedQuery, DEFAULT_LIMIT, MAX_LIMIT};
pub use response::{FeedFailure, FeedItem, FeedMeta, FeedResponse};
pub use service::{FeedService, DEFAULT_QUERY_WINDOW};
