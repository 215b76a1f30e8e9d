//! Database layer for grabtrack
//!
//! Handles SQLite persistence for the download history the outcome
//! detectors key their idempotence on.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`history`] — History rows and the [`HistoryStore`] implementation

use crate::types::{ClientId, HistoryEventType, HistoryRecord};
use async_trait::async_trait;
use sqlx::{FromRow, sqlite::SqlitePool};
use std::collections::HashMap;

mod history;
mod migrations;

/// Read/write boundary between the tracker and the history store
///
/// The tracker records grab/fail/import events and reads them back to
/// keep detector actions idempotent across restarts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All grabbed events, most recent first
    async fn grabbed(&self) -> crate::Result<Vec<HistoryRecord>>;

    /// All failed events, most recent first
    async fn failed(&self) -> crate::Result<Vec<HistoryRecord>>;

    /// All imported events, most recent first
    async fn imported(&self) -> crate::Result<Vec<HistoryRecord>>;

    /// Record a new event; returns the row id
    async fn record(&self, row: &NewHistoryRow) -> crate::Result<i64>;
}

/// New history event to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewHistoryRow {
    /// Event kind
    pub event: HistoryEventType,
    /// Release title the event refers to
    pub source_title: String,
    /// Category label
    pub category: Option<String>,
    /// Definition id of the client involved
    pub client_id: Option<ClientId>,
    /// Free-form event data (client name, item id)
    pub data: HashMap<String, String>,
}

/// History record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    /// Unique database ID
    pub id: i64,
    /// Event kind code (see [`HistoryEventType`])
    pub event: i32,
    /// Release title the event refers to
    pub source_title: String,
    /// Category label
    pub category: Option<String>,
    /// Definition id of the client involved
    pub client_id: Option<i64>,
    /// Unix timestamp when the event was recorded
    pub date: i64,
    /// Event data as a JSON object
    pub data: String,
}

impl From<HistoryRow> for HistoryRecord {
    fn from(row: HistoryRow) -> Self {
        use chrono::{TimeZone, Utc};

        HistoryRecord {
            id: row.id,
            event: HistoryEventType::from_i32(row.event),
            source_title: row.source_title,
            category: row.category,
            client_id: row.client_id.map(ClientId::new),
            date: Utc
                .timestamp_opt(row.date, 0)
                .single()
                .unwrap_or_else(Utc::now),
            // Unreadable data degrades to an empty map; the row itself
            // still counts for idempotence checks
            data: serde_json::from_str(&row.data).unwrap_or_default(),
        }
    }
}

/// Database handle for grabtrack
pub struct Database {
    pool: SqlitePool,
}
