//! REST API server module
//!
//! Read-only HTTP surface over the tracker: the queue, tracked and
//! completed views, grab/fail/import history, client listing and
//! connection tests, an explicit reconcile trigger, and a server-sent
//! event stream.

use crate::db::Database;
use crate::{Config, DownloadTracker, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Queue Views
/// - `GET /queue` - Downloads the tracker still has work for
/// - `GET /tracked` - Every tracked download, including removed ones
/// - `GET /completed` - Finished downloads awaiting import
/// - `GET /stats` - Tracking statistics
/// - `POST /check` - Run a reconciliation pass now
///
/// ## Download Clients
/// - `GET /clients` - List configured clients
/// - `POST /clients/:id/test` - Test a client connection
///
/// ## History
/// - `GET /history` - Grab/fail/import history (with pagination)
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(
    tracker: Arc<DownloadTracker>,
    db: Arc<Database>,
    config: Arc<Config>,
) -> Router {
    let state = AppState::new(tracker, db, config.clone());

    let router = Router::new()
        // Queue views
        .route("/queue", get(routes::get_queue))
        .route("/tracked", get(routes::get_tracked))
        .route("/completed", get(routes::get_completed))
        .route("/stats", get(routes::get_stats))
        .route("/check", post(routes::run_check))
        // Download clients
        .route("/clients", get(routes::list_clients))
        .route("/clients/:id/test", post(routes::test_client))
        // History
        .route("/history", get(routes::get_history))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Swagger UI serves its own copy of the spec under the documented prefix
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Auth sits inside CORS so preflight requests are answered without a key
    let router = if config.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer from the configured origins
///
/// `"*"` anywhere in the list (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Binds a TCP listener and serves the router until the server stops,
/// either from an error or because the task was cancelled. The tracker
/// keeps reconciling independently of this server.
pub async fn start_api_server(
    tracker: Arc<DownloadTracker>,
    db: Arc<Database>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    let app = create_router(tracker, db, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
