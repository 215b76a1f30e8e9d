//! Core types for grabtrack

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

/// Unique identifier for a configured download client definition
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ClientId(pub i64);

impl ClientId {
    /// Create a new ClientId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ClientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ClientId> for i64 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for ClientId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<ClientId> for i64 {
    fn eq(&self, other: &ClientId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for ClientId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ClientId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ClientId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Composite key identifying one tracked download across reconciliation passes.
///
/// Formatted as `"{client_id}-{download_client_id}"`. The client id prefix keeps
/// keys from colliding when two backends reuse the same item id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TrackingId(pub String);

impl TrackingId {
    /// Build the key for an item reported by the given client definition
    pub fn new(client_id: ClientId, download_client_id: &str) -> Self {
        Self(format!("{}-{}", client_id.0, download_client_id))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TrackingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Status a download client reports for one of its items
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownloadItemStatus {
    /// Waiting in the client's queue
    Queued,
    /// Paused inside the client
    Paused,
    /// Actively downloading or post-processing inside the client
    Downloading,
    /// Finished successfully; output is ready for import
    Completed,
    /// Failed inside the client
    Failed,
}

/// Lifecycle state of a tracked download, owned by the reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrackedState {
    /// Newly observed this pass; not yet processed by the outcome detectors
    Unknown,
    /// Known to the tracker and present in the client's latest report
    Downloading,
    /// No longer reported by its client; terminal
    Removed,
}

/// One item as reported by a download client, already normalized
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadItem {
    /// Identifier assigned by the client (SABnzbd nzo id, NzbGet id, ...)
    pub download_client_id: String,

    /// Definition id of the client that reported this item
    pub client_id: ClientId,

    /// Display name of the client that reported this item
    pub client_name: String,

    /// Release title
    pub title: String,

    /// Category the item is filed under inside the client
    pub category: Option<String>,

    /// Total size in bytes
    pub total_size: u64,

    /// Bytes remaining to download
    pub remaining_size: u64,

    /// Estimated time to completion (None if unknown or finished)
    pub remaining_time: Option<Duration>,

    /// Final output directory reported by the client (completed items)
    pub output_path: Option<PathBuf>,

    /// Normalized status
    pub status: DownloadItemStatus,

    /// Error or progress message reported by the client
    pub message: Option<String>,
}

/// A download under reconciliation, one per tracking id
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackedDownload {
    /// Composite tracking key
    pub id: TrackingId,

    /// Definition id of the owning client
    pub client_id: ClientId,

    /// Latest item snapshot from the client
    pub item: DownloadItem,

    /// Reconciliation state
    pub state: TrackedState,

    /// Whether the failure outcome has already been recorded for this key
    pub failure_recorded: bool,

    /// Whether the import outcome has already been recorded for this key
    pub import_recorded: bool,

    /// When the tracker first observed this key
    pub first_seen: DateTime<Utc>,
}

impl TrackedDownload {
    /// Start tracking a freshly observed item in the Unknown state
    pub fn new(item: DownloadItem) -> Self {
        Self {
            id: TrackingId::new(item.client_id, &item.download_client_id),
            client_id: item.client_id,
            item,
            state: TrackedState::Unknown,
            failure_recorded: false,
            import_recorded: false,
            first_seen: Utc::now(),
        }
    }
}

/// Protocol a download client speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownloadProtocol {
    /// Usenet backends (SABnzbd, NzbGet)
    Usenet,
    /// BitTorrent backends
    Torrent,
}

impl std::fmt::Display for DownloadProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadProtocol::Usenet => write!(f, "usenet"),
            DownloadProtocol::Torrent => write!(f, "torrent"),
        }
    }
}

/// A release handed to a download client for grabbing
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteRelease {
    /// Release title
    pub title: String,

    /// URL of the NZB to fetch
    pub download_url: String,

    /// Protocol the release is fetched over (selects the grabbing client)
    pub protocol: DownloadProtocol,

    /// When the release was published (drives the priority tier)
    pub publish_date: Option<DateTime<Utc>>,
}

impl RemoteRelease {
    /// Whether the release was published within the last `days` days.
    ///
    /// Releases without a publish date count as older.
    pub fn is_recent(&self, days: i64) -> bool {
        match self.publish_date {
            Some(date) => Utc::now().signed_duration_since(date) <= chrono::Duration::days(days),
            None => false,
        }
    }
}

/// History event kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventType {
    /// A release was sent to a download client
    Grabbed,
    /// A download failed and the failure was recorded
    Failed,
    /// A completed download was imported
    Imported,
}

impl HistoryEventType {
    /// Convert integer event code to HistoryEventType
    pub fn from_i32(event: i32) -> Self {
        match event {
            1 => HistoryEventType::Grabbed,
            2 => HistoryEventType::Failed,
            3 => HistoryEventType::Imported,
            _ => HistoryEventType::Failed, // Default to Failed for unknown event codes
        }
    }

    /// Convert HistoryEventType to integer event code
    pub fn to_i32(&self) -> i32 {
        match self {
            HistoryEventType::Grabbed => 1,
            HistoryEventType::Failed => 2,
            HistoryEventType::Imported => 3,
        }
    }
}

/// Keys used in the history data map
pub mod history_data {
    /// Display name of the download client that handled the release
    pub const DOWNLOAD_CLIENT: &str = "downloadClient";
    /// Item id assigned by the download client
    pub const DOWNLOAD_CLIENT_ID: &str = "downloadClientId";
}

/// One history row
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryRecord {
    /// Row id
    pub id: i64,

    /// Event kind
    pub event: HistoryEventType,

    /// Release title the event refers to
    pub source_title: String,

    /// Category, when known
    pub category: Option<String>,

    /// Definition id of the client involved, when known
    pub client_id: Option<ClientId>,

    /// When the event was recorded
    pub date: DateTime<Utc>,

    /// Free-form event data
    pub data: HashMap<String, String>,
}

impl HistoryRecord {
    /// Download client item id stored in the data map, if any
    pub fn download_client_id(&self) -> Option<&str> {
        self.data
            .get(history_data::DOWNLOAD_CLIENT_ID)
            .map(String::as_str)
    }

    /// Download client display name stored in the data map, if any
    pub fn download_client(&self) -> Option<&str> {
        self.data
            .get(history_data::DOWNLOAD_CLIENT)
            .map(String::as_str)
    }
}

/// Event emitted by the tracker
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The queued view changed after a reconciliation pass
    QueueUpdated,

    /// A release was handed to a download client
    Grabbed {
        /// Tracking key the grab will appear under
        id: TrackingId,
        /// Release title
        title: String,
    },

    /// A tracked download failed and its failure was recorded
    DownloadFailed {
        /// Tracking key
        id: TrackingId,
        /// Release title
        title: String,
        /// Failure message reported by the client, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A completed download was imported
    DownloadImported {
        /// Tracking key
        id: TrackingId,
        /// Release title
        title: String,
        /// Output path that was imported
        path: PathBuf,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// Result of a download client connectivity test
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientTestResult {
    /// Whether the test was successful
    pub success: bool,

    /// Latency of the version probe (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<Duration>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Backend version string (if reported)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Counts over the current tracked snapshot
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackingStats {
    /// Total tracked downloads, including removed ones
    pub total: usize,

    /// Downloads in the Unknown state
    pub unknown: usize,

    /// Downloads in the Downloading state
    pub downloading: usize,

    /// Downloads in the Removed state
    pub removed: usize,

    /// Size of the queued view
    pub queued: usize,

    /// Downloads with a recorded failure
    pub failures_recorded: usize,

    /// Downloads with a recorded import
    pub imports_recorded: usize,
}
