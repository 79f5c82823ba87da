//! Source management handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::freshness::{HealthRepository, SourceHealth};
use crate::settings::EffectiveSourceList;
use crate::sources::{Category, CustomSourceConfig, ResolvedSource};
use crate::web::error::ApiError;

/// PATCH body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOverrideRequest {
    pub enabled: Option<bool>,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSourceRequest {
    pub name: String,
    pub feed_url: String,
    pub category: String,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub sources: Vec<SourceHealth>,
}

/// GET /api/sources
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EffectiveSourceList>, ApiError> {
    let sources = state.resolver().effective_sources().await?;
    Ok(Json(sources.as_ref().clone()))
}

/// PATCH /api/sources/:id
pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SourceOverrideRequest>,
) -> Result<Json<ResolvedSource>, ApiError> {
    if req.enabled.is_none() && req.priority.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    let source = state
        .resolver()
        .set_source_override(&id, req.enabled, req.priority)
        .await?;
    Ok(Json(source))
}

/// DELETE /api/sources/:id
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.resolver().delete_source(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sources/:id/restore
pub async fn restore_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.resolver().restore_source(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sources/custom
pub async fn add_custom_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CustomSourceRequest>,
) -> Result<(StatusCode, Json<CustomSourceConfig>), ApiError> {
    let category = req
        .category
        .parse::<Category>()
        .map_err(|_| ApiError::invalid_value(format!("Invalid category: {}", req.category), Category::valid_values()))?;
    let custom = state
        .resolver()
        .add_custom_source(&req.name, &req.feed_url, category, req.priority)
        .await?;
    Ok((StatusCode::CREATED, Json(custom)))
}

/// GET /api/sources/health
pub async fn list_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let sources = HealthRepository::new(state.db.pool()).list().await?;
    Ok(Json(HealthResponse { sources }))
}
