//! Error types for grabtrack
//!
//! This module provides comprehensive error handling for the library, including:
//! - Domain-specific error types (DownloadClient, Import, Database, etc.)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Context information (client id, item id, program name, etc.)

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for grabtrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for grabtrack
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "tracking.interval_secs")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Download client communication or protocol error
    #[error("download client error: {0}")]
    DownloadClient(#[from] DownloadClientError),

    /// Import of a completed download failed
    #[error("import error: {0}")]
    Import(#[from] ImportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// No enabled download client accepts the requested protocol
    #[error("no enabled download client for protocol {protocol}")]
    NoAvailableClient {
        /// The protocol no client was found for (e.g., "usenet")
        protocol: String,
    },

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by or about an external download client backend
#[derive(Debug, Error)]
pub enum DownloadClientError {
    /// Could not reach the backend at all
    #[error("failed to connect to {name}: {message}")]
    ConnectionFailed {
        /// Display name of the client definition
        name: String,
        /// Underlying connection error
        message: String,
    },

    /// The backend rejected our credentials
    #[error("authentication with {name} failed: {message}")]
    AuthenticationFailed {
        /// Display name of the client definition
        name: String,
        /// Error reported by the backend
        message: String,
    },

    /// The backend answered with something we could not interpret
    #[error("unexpected response from {name}: {message}")]
    Protocol {
        /// Display name of the client definition
        name: String,
        /// What was wrong with the response
        message: String,
    },

    /// The backend did not answer within the poll timeout
    #[error("{name} did not respond within {timeout_secs}s")]
    Timeout {
        /// Display name of the client definition
        name: String,
        /// The timeout that was exceeded, in seconds
        timeout_secs: u64,
    },

    /// The backend refused to accept a grabbed release
    #[error("{name} rejected \"{title}\": {message}")]
    DownloadRejected {
        /// Display name of the client definition
        name: String,
        /// Title of the rejected release
        title: String,
        /// Rejection reason reported by the backend
        message: String,
    },

    /// The backend no longer knows the referenced item
    #[error("item {id} not found on {name}")]
    ItemNotFound {
        /// Display name of the client definition
        name: String,
        /// The download client item id that was not found
        id: String,
    },
}

/// Errors raised while importing a completed download
#[derive(Debug, Error)]
pub enum ImportError {
    /// The client reported completion but no output path
    #[error("completed download \"{title}\" has no output path")]
    OutputMissing {
        /// Title of the download missing its output path
        title: String,
    },

    /// The configured import command exited unsuccessfully
    #[error("import command {program} exited with {exit_code:?}")]
    CommandFailed {
        /// The program that was executed
        program: String,
        /// Exit code, when the process terminated normally
        exit_code: Option<i32>,
    },

    /// The import handler rejected the download
    #[error("import of \"{title}\" failed: {reason}")]
    Failed {
        /// Title of the download that failed to import
        title: String,
        /// Why the import failed
        reason: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "Client 3 not found",
///     "details": {
///       "client_id": 3
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    ///
    /// This can include fields like client_id, item ids, validation errors, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::DownloadClient(DownloadClientError::ItemNotFound { .. }) => 404,

            // 422 Unprocessable Entity - Semantic errors
            Error::Import(_) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::DownloadClient(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::NoAvailableClient { .. } => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::DownloadClient(e) => match e {
                DownloadClientError::ConnectionFailed { .. } => "client_connection_failed",
                DownloadClientError::AuthenticationFailed { .. } => "client_authentication_failed",
                DownloadClientError::Protocol { .. } => "client_protocol_error",
                DownloadClientError::Timeout { .. } => "client_timeout",
                DownloadClientError::DownloadRejected { .. } => "download_rejected",
                DownloadClientError::ItemNotFound { .. } => "item_not_found",
            },
            Error::Import(e) => match e {
                ImportError::OutputMissing { .. } => "import_output_missing",
                ImportError::CommandFailed { .. } => "import_command_failed",
                ImportError::Failed { .. } => "import_failed",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::NoAvailableClient { .. } => "no_available_client",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::DownloadClient(DownloadClientError::ItemNotFound { name, id }) => {
                Some(serde_json::json!({
                    "client": name,
                    "download_client_id": id,
                }))
            }
            Error::DownloadClient(DownloadClientError::Timeout { name, timeout_secs }) => {
                Some(serde_json::json!({
                    "client": name,
                    "timeout_secs": timeout_secs,
                }))
            }
            Error::DownloadClient(DownloadClientError::DownloadRejected {
                name, title, ..
            }) => Some(serde_json::json!({
                "client": name,
                "title": title,
            })),
            Error::Import(ImportError::CommandFailed { program, exit_code }) => {
                Some(serde_json::json!({
                    "program": program,
                    "exit_code": exit_code,
                }))
            }
            Error::NoAvailableClient { protocol } => Some(serde_json::json!({
                "protocol": protocol,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
