use super::*;
use crate::Config;
use crate::db::Database;
use crate::tracking::test_helpers::{TrackerHarness, harness};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;

mod history;

/// Everything a route test needs: the router, the fake-client tracker
/// behind it, and the history database it reads from
struct TestApi {
    app: Router,
    harness: TrackerHarness,
    db: Arc<Database>,
    _temp_dir: tempfile::TempDir,
}

/// Build a router over a fresh tracker and an empty on-disk history database
async fn test_api() -> TestApi {
    test_api_with(Config::default()).await
}

async fn test_api_with(config: Config) -> TestApi {
    let harness = harness();
    let temp_dir = tempdir().unwrap();
    let db = Arc::new(
        Database::new(&temp_dir.path().join("history.db"))
            .await
            .unwrap(),
    );
    let config = Arc::new(config);

    let app = create_router(harness.tracker.clone(), db.clone(), config);

    TestApi {
        app,
        harness,
        db,
        _temp_dir: temp_dir,
    }
}

impl TestApi {
    /// GET `uri` and parse the JSON body
    async fn get_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        (status, json)
    }

    /// POST `uri` with an empty body and parse the JSON body if any
    async fn post_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        (status, json)
    }
}

#[tokio::test]
async fn test_api_server_spawns() {
    let api = test_api().await;

    // Port 0 = OS assigns a free port
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let tracker = api.harness.tracker.clone();
        let db = api.db.clone();
        async move { start_api_server(tracker, db, config).await }
    });

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    api_handle.abort();

    // The test passes if we got here without panicking
}

#[tokio::test]
async fn test_health_endpoint() {
    let api = test_api().await;

    let (status, body) = api.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let mut config = Config::default();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let api = test_api_with(config).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // The CORS middleware should add access-control-allow-origin header
    let headers = response.headers();
    assert!(
        headers.contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_authentication_with_api_key() {
    let mut config = Config::default();
    config.api.api_key = Some("test-secret-key".to_string());
    let api = test_api_with(config).await;

    // Request without API key should return 401
    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Request with valid API key should succeed
    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Api-Key", "test-secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Request with invalid API key should return 401
    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Api-Key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authentication_disabled_by_default() {
    let api = test_api().await;

    let (status, _) = api.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_server_starts_and_responds_to_health() {
    let api = test_api().await;

    // Bind to a random available port (port 0)
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = api.app.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/health", addr);
    let response = client.get(url).send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    server_handle.abort();
}

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let api = test_api().await;

    let (status, json) = api.get_json("/openapi.json").await;

    assert_eq!(status, StatusCode::OK);

    // Verify it has the required OpenAPI fields
    assert!(json.get("openapi").is_some(), "Should have 'openapi' field");
    assert!(json.get("info").is_some(), "Should have 'info' field");
    assert!(json.get("paths").is_some(), "Should have 'paths' field");

    let openapi_version = json["openapi"].as_str().unwrap();
    assert!(openapi_version.starts_with("3."), "Should be OpenAPI 3.x");

    assert_eq!(json["info"]["title"], "grabtrack REST API");

    // Every read surface the router serves is documented
    let paths = json["paths"].as_object().unwrap();
    for expected in [
        "/api/v1/queue",
        "/api/v1/tracked",
        "/api/v1/completed",
        "/api/v1/stats",
        "/api/v1/check",
        "/api/v1/clients",
        "/api/v1/clients/{id}/test",
        "/api/v1/history",
        "/api/v1/health",
        "/api/v1/openapi.json",
        "/api/v1/events",
    ] {
        assert!(
            paths.contains_key(expected),
            "OpenAPI spec must contain path: {}",
            expected
        );
    }

    // Schemas back the documented responses
    let schemas = json["components"]["schemas"].as_object().unwrap();
    for expected in ["TrackedDownload", "TrackingStats", "HistoryRecord"] {
        assert!(
            schemas.contains_key(expected),
            "OpenAPI spec should contain schema: {}",
            expected
        );
    }
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let mut config = Config::default();
    config.api.swagger_ui = true;
    let api = test_api_with(config).await;

    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Swagger UI should be accessible when enabled"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    assert!(
        body_str.contains("<!DOCTYPE html>") || body_str.contains("<html"),
        "Response should contain HTML"
    );
    assert!(
        body_str.contains("swagger") || body_str.contains("Swagger"),
        "Response should contain Swagger-related content"
    );
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let mut config = Config::default();
    config.api.swagger_ui = false;
    let api = test_api_with(config).await;

    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/swagger-ui/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.status(),
        StatusCode::NOT_FOUND,
        "Swagger UI should not be accessible when disabled"
    );
}

#[tokio::test]
async fn test_event_stream_content_type() {
    let api = test_api().await;

    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with("text/event-stream"),
        "Expected an SSE content type, got {content_type}"
    );
}
