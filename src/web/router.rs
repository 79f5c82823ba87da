//! Router configuration for the web API.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_custom_source, delete_source, get_feed, get_settings, health_check, list_health,
    list_sources, restore_source, update_setting, update_source, AppState,
};
use super::middleware::{create_cors_layer, rate_limit, RateLimitState};

/// Create the full application router.
pub fn create_router(
    app_state: Arc<AppState>,
    limiter: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let source_routes = Router::new()
        .route("/", get(list_sources))
        .route("/health", get(list_health))
        .route("/custom", post(add_custom_source))
        .route("/:id", patch(update_source).delete(delete_source))
        .route("/:id/restore", post(restore_source));

    let api_routes = Router::new()
        .route("/feed", get(get_feed))
        .nest("/sources", source_routes)
        .route("/settings", get(get_settings))
        .route("/settings/:key", put(update_setting))
        .layer(middleware::from_fn(move |req, next| {
            let state = limiter.clone();
            rate_limit(state, req, next)
        }));

    Router::new()
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(CompressionLayer::new()),
        )
        .with_state(app_state)
}

/// Liveness route, outside the rate limit.
pub fn create_health_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health_check))
}

