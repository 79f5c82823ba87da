//! Feed handler.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use super::AppState;
use crate::feed::{FeedParams, FeedQuery, FeedResponse};
use crate::web::error::ApiError;

/// GET /api/feed - Ranked items across enabled sources.
///
/// Query: `timeRange`, `category` (comma list), `limit`, `offset`.
pub async fn get_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedResponse>, ApiError> {
    let query = FeedQuery::try_from(params)?;
    let response = state.feed.get_feed(query).await?;
    Ok(Json(response))
}
