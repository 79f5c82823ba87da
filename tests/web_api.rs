//! Web API tests.

mod common;

use std::sync::Arc;

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use common::{harness, Harness, FORUM, PAPER};
use trendfeed::web::middleware::RateLimitState;
use trendfeed::web::{create_router, AppState};

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Create a test server with an in-memory database.
async fn create_test_server_with_limit(rate_limit: u32) -> (TestServer, Harness) {
    let h = harness().await;
    let state = Arc::new(AppState::new(h.db.clone(), h.feed.clone()));
    let router = create_router(state, Arc::new(RateLimitState::new(rate_limit)), &[]);
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, h)
}

async fn create_test_server() -> (TestServer, Harness) {
    create_test_server_with_limit(1000).await
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (server, _h) = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

// ============================================================================
// Feed
// ============================================================================

#[tokio::test]
async fn test_get_feed() {
    let (server, _h) = create_test_server().await;

    let response = server.get("/api/feed").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["meta"]["totalItems"], 6);
    assert_eq!(body["meta"]["returnedItems"], 6);
    assert_eq!(body["meta"]["timeRange"], "24h");
    assert_eq!(body["meta"]["categories"]["news"], 2);
    assert!(body.get("failures").is_none());

    let first = &body["items"][0];
    assert!(first["trendingScore"].as_f64().unwrap() > 0.0);
    assert!(first["source"].is_string());
    assert!(first["addedAt"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_get_feed_with_filters() {
    let (server, _h) = create_test_server().await;

    let response = server
        .get("/api/feed")
        .add_query_param("timeRange", "7d")
        .add_query_param("category", "news")
        .add_query_param("limit", "1")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["meta"]["timeRange"], "7d");
    assert_eq!(body["meta"]["totalItems"], 2);
    assert_eq!(body["meta"]["returnedItems"], 1);
    assert_eq!(body["items"][0]["sourceId"], PAPER);
    assert_eq!(body["items"][0]["category"], "news");
}

#[tokio::test]
async fn test_get_feed_reports_failures() {
    let (server, h) = create_test_server().await;
    h.factory.script(PAPER, common::Upstream::Fail(502));

    let body: Value = server.get("/api/feed").await.json();
    assert_eq!(body["failures"][0]["source"], "Daily Paper");
    assert_eq!(body["meta"]["totalItems"], 4);
}

#[tokio::test]
async fn test_invalid_time_range_lists_valid_values() {
    let (server, _h) = create_test_server().await;

    let response = server.get("/api/feed").add_query_param("timeRange", "3d").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("3d"));
    let valid: Vec<&str> = body["validValues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(valid, vec!["1h", "12h", "24h", "48h", "7d"]);
}

#[tokio::test]
async fn test_invalid_category_lists_valid_values() {
    let (server, _h) = create_test_server().await;

    let response = server.get("/api/feed").add_query_param("category", "sports").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["validValues"]
        .as_array()
        .unwrap()
        .contains(&json!("ai-labs")));
}

#[tokio::test]
async fn test_invalid_limit() {
    let (server, _h) = create_test_server().await;
    let response = server.get("/api/feed").add_query_param("limit", "0").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Sources
// ============================================================================

#[tokio::test]
async fn test_list_sources() {
    let (server, _h) = create_test_server().await;

    let body: Value = server.get("/api/sources").await.json();
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert!(sources.iter().all(|s| s["isEnabled"] == true));
    assert_eq!(body["enabledCategories"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_source_override() {
    let (server, _h) = create_test_server().await;

    let response = server
        .patch(&format!("/api/sources/{FORUM}"))
        .json(&json!({"enabled": false, "priority": 4}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["isEnabled"], false);
    assert_eq!(body["effectivePriority"], 4);

    let feed: Value = server.get("/api/feed").await.json();
    assert_eq!(feed["meta"]["totalItems"], 4);
    assert!(feed["meta"]["categories"].get("community").is_none());
}

#[tokio::test]
async fn test_update_source_errors() {
    let (server, _h) = create_test_server().await;

    let response = server
        .patch("/api/sources/no-such-source")
        .json(&json!({"enabled": false}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "source no-such-source not found");

    let response = server
        .patch(&format!("/api/sources/{FORUM}"))
        .json(&json!({"priority": 9}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .patch(&format!("/api/sources/{FORUM}"))
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_and_restore_source() {
    let (server, _h) = create_test_server().await;

    server
        .delete(&format!("/api/sources/{FORUM}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let body: Value = server.get("/api/sources").await.json();
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);

    server
        .post(&format!("/api/sources/{FORUM}/restore"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let body: Value = server.get("/api/sources").await.json();
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);

    server
        .post(&format!("/api/sources/{FORUM}/restore"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_custom_source() {
    let (server, _h) = create_test_server().await;

    let response = server
        .post("/api/sources/custom")
        .json(&json!({
            "name": "My Blog",
            "feedUrl": "https://blog.example.com/feed.xml",
            "category": "newsletters"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], "custom-my-blog");
    assert_eq!(body["category"], "newsletters");

    let sources: Value = server.get("/api/sources").await.json();
    let custom = sources["sources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "custom-my-blog")
        .unwrap();
    assert_eq!(custom["isCustom"], true);

    // Same name again.
    let response = server
        .post("/api/sources/custom")
        .json(&json!({
            "name": "My Blog",
            "feedUrl": "https://other.example.com/feed.xml",
            "category": "newsletters"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    server
        .delete("/api/sources/custom-my-blog")
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_add_custom_source_rejects_bad_input() {
    let (server, _h) = create_test_server().await;

    let response = server
        .post("/api/sources/custom")
        .json(&json!({"name": "X", "feedUrl": "https://x.example.com/rss", "category": "sports"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["validValues"].as_array().unwrap().len(), 7);

    let response = server
        .post("/api/sources/custom")
        .json(&json!({"name": "Local", "feedUrl": "http://127.0.0.1/rss", "category": "news"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_source_health_after_fetch() {
    let (server, h) = create_test_server().await;
    h.factory.script(PAPER, common::Upstream::Fail(503));

    server.get("/api/feed").await.assert_status_ok();
    h.settle().await;

    let body: Value = server.get("/api/sources/health").await.json();
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    let paper = sources.iter().find(|s| s["sourceId"] == PAPER).unwrap();
    assert_eq!(paper["consecutiveFailures"], 1);
    let forum = sources.iter().find(|s| s["sourceId"] == FORUM).unwrap();
    assert_eq!(forum["lastItemCount"], 2);
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_get_settings_defaults() {
    let (server, _h) = create_test_server().await;

    let body: Value = server.get("/api/settings").await.json();
    assert_eq!(body["theme"], "system");
    assert_eq!(body["defaultTimeRange"], "24h");
    assert_eq!(body["boostKeywords"], json!([]));
}

#[tokio::test]
async fn test_update_setting() {
    let (server, _h) = create_test_server().await;

    let response = server
        .put("/api/settings/theme")
        .json(&json!({"value": "dark"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["theme"], "dark");

    let body: Value = server.get("/api/settings").await.json();
    assert_eq!(body["theme"], "dark");
}

#[tokio::test]
async fn test_update_setting_errors() {
    let (server, _h) = create_test_server().await;

    let response = server
        .put("/api/settings/colour")
        .json(&json!({"value": "red"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["validValues"].as_array().unwrap().contains(&json!("theme")));

    let response = server
        .put("/api/settings/theme")
        .json(&json!({"value": "neon"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .put("/api/settings/boost_keywords")
        .json(&json!({"value": "not-a-list"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .put("/api/settings/custom_sources")
        .json(&json!({"value": [{
            "id": FORUM,
            "name": "Shadow",
            "feedUrl": "http://169.254.169.254/latest/meta-data",
            "category": "news"
        }]}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = server.get("/api/sources").await.json();
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit() {
    let (server, _h) = create_test_server_with_limit(2).await;

    server.get("/api/settings").await.assert_status_ok();
    server.get("/api/settings").await.assert_status_ok();

    let response = server.get("/api/settings").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .header(RETRY_AFTER)
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // Liveness is not limited.
    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let (server, _h) = create_test_server_with_limit(1).await;

    server
        .get("/api/settings")
        .add_header(FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"))
        .await
        .assert_status_ok();
    server
        .get("/api/settings")
        .add_header(FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    server
        .get("/api/settings")
        .add_header(FORWARDED_FOR, HeaderValue::from_static("10.0.0.2"))
        .await
        .assert_status_ok();
}
