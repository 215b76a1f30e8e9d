//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`queue`] — Queue views and the reconcile trigger
//! - [`clients`] — Download client listing and connection tests
//! - [`history`] — Grab/fail/import history
//! - [`system`] — Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod clients;
mod history;
mod queue;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use clients::*;
pub use history::*;
pub use queue::*;
pub use system::*;

// ============================================================================
// Query/Response Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /history
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HistoryQuery {
    /// Filter by event kind: "grabbed", "failed" or "imported"
    pub event_type: Option<String>,
    /// Maximum number of rows to return (default: 50)
    pub limit: Option<i64>,
    /// Number of rows to skip (default: 0)
    pub offset: Option<i64>,
}

/// One configured download client, as reported by GET /clients
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClientResponse {
    /// Client definition id
    pub id: crate::types::ClientId,
    /// Display name
    pub name: String,
    /// Backend kind
    pub kind: crate::config::ClientKind,
    /// Protocol the client downloads over
    pub protocol: crate::types::DownloadProtocol,
    /// Whether the client takes part in polling and grabs
    pub enable: bool,
    /// Category the client reports downloads under, if any
    pub category: Option<String>,
}
