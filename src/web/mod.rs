//! JSON web API.
//!
//! Serves the ranked feed, source management, settings and health over axum,
//! with per-IP rate limiting, CORS and request tracing.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
