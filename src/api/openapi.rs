//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the grabtrack REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the grabtrack REST API
///
/// This struct is used to generate the OpenAPI 3.1 specification that describes
/// all available endpoints, request/response types, and API behavior.
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "grabtrack REST API",
        version = "0.2.0",
        description = "OpenAPI 3.1 compliant REST API for observing download tracking, reconciliation state, and grab/outcome history",
        contact(
            name = "grabtrack",
            url = "https://github.com/jvz-devx/grabtrack"
        ),
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6791/api/v1", description = "Local development server")
    ),
    paths(
        // Tracked queue views
        crate::api::routes::get_queue,
        crate::api::routes::get_tracked,
        crate::api::routes::get_completed,
        crate::api::routes::get_stats,
        crate::api::routes::run_check,

        // Download clients
        crate::api::routes::list_clients,
        crate::api::routes::test_client,

        // History
        crate::api::routes::get_history,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::ClientId,
        crate::types::TrackingId,
        crate::types::DownloadProtocol,
        crate::types::DownloadItemStatus,
        crate::types::TrackedState,
        crate::types::DownloadItem,
        crate::types::TrackedDownload,
        crate::types::RemoteRelease,
        crate::types::HistoryEventType,
        crate::types::HistoryRecord,
        crate::types::Event,
        crate::types::ClientTestResult,
        crate::types::TrackingStats,

        // Config types from config.rs
        crate::config::Config,
        crate::config::ClientKind,
        crate::config::GrabPriority,
        crate::config::ClientConfig,
        crate::config::TrackingConfig,
        crate::config::ImportMode,
        crate::config::ImportConfig,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,

        // Client definition from clients/mod.rs
        crate::clients::ClientDefinition,

        // API request/response types from routes
        crate::api::routes::HistoryQuery,
        crate::api::routes::ClientResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "queue", description = "Tracked downloads - Inspect the reconciled queue and trigger checks"),
        (name = "clients", description = "Download clients - List configured backends and test connectivity"),
        (name = "history", description = "Grab and outcome history - Query recorded grab, failure, and import events"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, event stream"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
