//! Configuration types for grabtrack

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for the download tracker
///
/// Fields are organized into logical sub-configs:
/// - [`clients`](ClientConfig) — download client definitions
/// - [`tracking`](TrackingConfig) — reconciliation cadence and outcome handling
/// - [`import`](ImportConfig) — what to do with completed downloads
/// - [`persistence`](PersistenceConfig) — database location
/// - [`api`](ApiConfig) — REST API settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download client definitions
    ///
    /// With none configured the tracker idles and grabs fail with
    /// "no available client".
    pub clients: Vec<ClientConfig>,

    /// Reconciliation behavior
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Import behavior for completed downloads
    #[serde(default)]
    pub import: ImportConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Kind of download client backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// SABnzbd (JSON API)
    Sabnzbd,
    /// NzbGet (JSON-RPC API)
    Nzbget,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientKind::Sabnzbd => write!(f, "sabnzbd"),
            ClientKind::Nzbget => write!(f, "nzbget"),
        }
    }
}

/// Priority assigned to grabbed releases
///
/// Backends use different numeric scales; each adapter maps these
/// to its own values.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum GrabPriority {
    /// Below normal
    Low,
    /// Backend default
    #[default]
    Normal,
    /// Above normal
    High,
    /// Start immediately, bypassing the queue
    Force,
}

/// One download client definition
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientConfig {
    /// Definition id, unique across the configuration
    pub id: i64,

    /// Display name used in logs and history rows
    pub name: String,

    /// Backend kind
    pub kind: ClientKind,

    /// Whether this client participates in grabbing and tracking (default: true)
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Backend hostname
    pub host: String,

    /// Backend port (typically 8080 for SABnzbd, 6789 for NzbGet)
    pub port: u16,

    /// Use HTTPS when talking to the backend (default: false)
    #[serde(default)]
    pub use_tls: bool,

    /// URL base when the backend lives behind a reverse proxy (e.g. "/sabnzbd")
    #[serde(default)]
    pub url_base: Option<String>,

    /// API key (SABnzbd)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Username (NzbGet)
    #[serde(default)]
    pub username: Option<String>,

    /// Password (NzbGet)
    #[serde(default)]
    pub password: Option<String>,

    /// Category this tracker owns inside the backend
    ///
    /// Items filed under other categories are invisible to the tracker.
    #[serde(default)]
    pub category: Option<String>,

    /// Priority for releases published within `recent_age_days` (default: normal)
    #[serde(default)]
    pub recent_priority: GrabPriority,

    /// Priority for older releases (default: normal)
    #[serde(default)]
    pub older_priority: GrabPriority,

    /// Age in days below which a release counts as recent (default: 14)
    #[serde(default = "default_recent_age_days")]
    pub recent_age_days: i64,
}

/// Reconciliation behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackingConfig {
    /// Interval between periodic reconciliation passes (default: 60 seconds)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Per-client poll timeout within a pass (default: 10 seconds)
    ///
    /// A client that does not answer in time contributes nothing to the
    /// pass; its items are treated like a failed poll.
    #[serde(default = "default_poll_timeout", with = "duration_serde")]
    pub poll_timeout: Duration,

    /// Handle completed downloads: run the import pipeline and record
    /// the import in history (default: true)
    #[serde(default = "default_true")]
    pub enable_completed_download_handling: bool,

    /// Handle failed downloads: record the failure in history and emit
    /// a failure event (default: true)
    #[serde(default = "default_true")]
    pub enable_failed_download_handling: bool,

    /// Tell the client to download failed items again after recording the
    /// failure (default: false)
    ///
    /// Takes precedence over `remove_failed_downloads`.
    #[serde(default)]
    pub retry_failed_downloads: bool,

    /// Remove failed downloads from the client after recording the
    /// failure (default: true)
    #[serde(default = "default_true")]
    pub remove_failed_downloads: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            poll_timeout: default_poll_timeout(),
            enable_completed_download_handling: true,
            enable_failed_download_handling: true,
            retry_failed_downloads: false,
            remove_failed_downloads: true,
        }
    }
}

/// Import handler selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Record imports without moving anything
    #[default]
    Noop,
    /// Run an external command for each completed download
    Command,
}

/// Import behavior for completed downloads
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportConfig {
    /// Which import handler to use (default: noop)
    #[serde(default)]
    pub mode: ImportMode,

    /// Program to run in command mode
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Extra arguments passed before the output path
    #[serde(default)]
    pub args: Vec<String>,

    /// How long the import command may run (default: 300 seconds)
    #[serde(default = "default_import_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            mode: ImportMode::default(),
            command: None,
            args: vec![],
            timeout: default_import_timeout(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./grabtrack.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6791)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_import_timeout() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_recent_age_days() -> i64 {
    14
}

fn default_database_path() -> PathBuf {
    PathBuf::from("grabtrack.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6791))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sab_client_json() -> serde_json::Value {
        serde_json::json!({
            "id": 1,
            "name": "sab",
            "kind": "sabnzbd",
            "host": "localhost",
            "port": 8080,
            "api_key": "5f7e4c1a",
            "category": "tv",
        })
    }

    #[test]
    fn minimal_config_fills_in_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "clients": [],
        }))
        .expect("minimal config should deserialize");

        assert_eq!(config.tracking.interval, Duration::from_secs(60));
        assert_eq!(config.tracking.poll_timeout, Duration::from_secs(10));
        assert!(config.tracking.enable_completed_download_handling);
        assert!(config.tracking.enable_failed_download_handling);
        assert!(!config.tracking.retry_failed_downloads);
        assert!(config.tracking.remove_failed_downloads);
        assert_eq!(config.import.mode, ImportMode::Noop);
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("grabtrack.db")
        );
        assert!(config.api.cors_enabled);
        assert!(config.api.swagger_ui);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn client_config_fills_in_defaults() {
        let client: ClientConfig =
            serde_json::from_value(sab_client_json()).expect("client config should deserialize");

        assert!(client.enable, "clients default to enabled");
        assert!(!client.use_tls);
        assert_eq!(client.recent_priority, GrabPriority::Normal);
        assert_eq!(client.older_priority, GrabPriority::Normal);
        assert_eq!(client.recent_age_days, 14);
        assert_eq!(client.category.as_deref(), Some("tv"));
    }

    #[test]
    fn client_kind_parses_lowercase_names() {
        let sab: ClientKind = serde_json::from_value(serde_json::json!("sabnzbd")).unwrap();
        let nzbget: ClientKind = serde_json::from_value(serde_json::json!("nzbget")).unwrap();

        assert_eq!(sab, ClientKind::Sabnzbd);
        assert_eq!(nzbget, ClientKind::Nzbget);
        assert_eq!(sab.to_string(), "sabnzbd");
        assert_eq!(nzbget.to_string(), "nzbget");
    }

    #[test]
    fn tracking_intervals_round_trip_as_seconds() {
        let tracking: TrackingConfig = serde_json::from_value(serde_json::json!({
            "interval": 30,
            "poll_timeout": 5,
        }))
        .unwrap();

        assert_eq!(tracking.interval, Duration::from_secs(30));
        assert_eq!(tracking.poll_timeout, Duration::from_secs(5));

        let json = serde_json::to_value(&tracking).unwrap();
        assert_eq!(json["interval"], 30);
        assert_eq!(json["poll_timeout"], 5);
    }

    #[test]
    fn config_round_trips_through_json() {
        let original = Config {
            clients: vec![
                serde_json::from_value(sab_client_json()).unwrap(),
            ],
            tracking: TrackingConfig {
                interval: Duration::from_secs(15),
                remove_failed_downloads: false,
                ..TrackingConfig::default()
            },
            ..Config::default()
        };

        let json = serde_json::to_string(&original).expect("serialize failed");
        let restored: Config = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(restored.clients.len(), 1);
        assert_eq!(restored.clients[0].name, "sab");
        assert_eq!(restored.tracking.interval, Duration::from_secs(15));
        assert!(!restored.tracking.remove_failed_downloads);
        assert_eq!(
            restored.persistence.database_path,
            original.persistence.database_path,
        );
    }

    #[test]
    fn grab_priority_defaults_to_normal_and_orders_by_urgency() {
        assert_eq!(GrabPriority::default(), GrabPriority::Normal);
        assert!(GrabPriority::Low < GrabPriority::Normal);
        assert!(GrabPriority::Normal < GrabPriority::High);
        assert!(GrabPriority::High < GrabPriority::Force);
    }
}
