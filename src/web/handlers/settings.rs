//! Settings handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::settings::{EffectiveConfig, SETTING_KEYS};
use crate::web::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct SettingRequest {
    pub value: Value,
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EffectiveConfig>, ApiError> {
    let config = state.resolver().effective_config().await?;
    Ok(Json(config.as_ref().clone()))
}

/// PUT /api/settings/:key - Returns the updated configuration.
pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(req): Json<SettingRequest>,
) -> Result<Json<EffectiveConfig>, ApiError> {
    if !SETTING_KEYS.contains(&key.as_str()) {
        return Err(ApiError::invalid_value(
            format!("Unknown setting: {key}"),
            SETTING_KEYS.iter().map(|k| k.to_string()).collect(),
        ));
    }
    state.resolver().update_setting(&key, req.value).await?;
    let config = state.resolver().effective_config().await?;
    Ok(Json(config.as_ref().clone()))
}
