//! Per-client rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use crate::web::error::ApiError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One governor limiter per client IP.
#[derive(Clone)]
pub struct RateLimitState {
    limiters: Arc<RwLock<HashMap<String, Arc<DirectLimiter>>>>,
    quota: Quota,
    clock: DefaultClock,
}

impl RateLimitState {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota: Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN)),
            clock: DefaultClock::default(),
        }
    }

    fn limiter(&self, ip: &str) -> Arc<DirectLimiter> {
        if let Some(limiter) = self
            .limiters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(ip)
        {
            return limiter.clone();
        }
        self.limiters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(ip.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone()
    }

    /// `Ok` if `ip` may proceed, else how long it must wait.
    pub fn check(&self, ip: &str) -> Result<(), Duration> {
        self.limiter(ip)
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drop limiters nobody else holds.
    pub fn cleanup(&self) {
        self.limiters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, v| Arc::strong_count(v) > 1);
    }
}

/// Client IP, preferring proxy headers over the socket address.
fn client_ip(req: &Request<Body>) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    header("X-Forwarded-For")
        .or_else(|| header("X-Real-IP"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects over-quota clients with 429 and `Retry-After`.
pub async fn rate_limit(state: Arc<RateLimitState>, req: Request<Body>, next: Next) -> Response {
    let ip = client_ip(&req);
    if let Err(wait) = state.check(&ip) {
        tracing::warn!(ip = %ip, retry_after_ms = wait.as_millis() as u64, "Rate limit exceeded");
        return ApiError::too_many_requests(wait).into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_per_ip() {
        let state = RateLimitState::new(3);
        for _ in 0..3 {
            assert!(state.check("10.0.0.1").is_ok());
        }
        let wait = state.check("10.0.0.1").unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(state.check("10.0.0.2").is_ok());
    }

    #[test]
    fn test_forwarded_header_wins() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.9");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }

    #[tokio::test]
    async fn test_middleware_rejects_with_retry_after() {
        use axum::{http::StatusCode, middleware, routing::get, Router};
        use http_body_util::BodyExt;
        use tower::util::ServiceExt;

        let state = Arc::new(RateLimitState::new(1));
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(middleware::from_fn(move |req, next| {
                rate_limit(state.clone(), req, next)
            }));

        let request = || Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }
}
