//! Download client adapters.
//!
//! Each backend gets an adapter implementing [`DownloadClient`]:
//! - [`sabnzbd`] - SABnzbd (JSON API)
//! - [`nzbget`] - NzbGet (JSON-RPC API)
//!
//! Adapters normalize backend-specific queue and history reports into
//! [`DownloadItem`]s, filter them down to the tracked category and the
//! matcher's catalog, and submit grabbed releases. The [`registry`] builds
//! adapters from configuration and hands them out by id or protocol.

pub mod nzbget;
pub mod registry;
pub mod sabnzbd;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::ClientConfig;
use crate::config::ClientKind;
use crate::error::Error;
use crate::types::{ClientId, ClientTestResult, DownloadItem, RemoteRelease};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

pub use crate::types::DownloadProtocol;

/// Identity of a configured download client
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientDefinition {
    /// Definition id, unique across the configuration
    pub id: ClientId,

    /// Display name used in logs and history rows
    pub name: String,

    /// Backend kind
    pub kind: ClientKind,

    /// Whether this client participates in grabbing and tracking
    pub enable: bool,

    /// Category this client tracks inside the backend
    pub category: Option<String>,
}

impl From<&ClientConfig> for ClientDefinition {
    fn from(config: &ClientConfig) -> Self {
        Self {
            id: ClientId::new(config.id),
            name: config.name.clone(),
            kind: config.kind,
            enable: config.enable,
            category: config.category.clone(),
        }
    }
}

/// Trait implemented by every download client adapter
///
/// `get_items` is the reconciliation input: one normalized snapshot of
/// everything the backend currently reports for the tracked category.
/// Adapters fail soft there; a backend that cannot be reached contributes
/// an empty snapshot and logs the error instead of aborting the pass.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Identity of this client
    fn definition(&self) -> &ClientDefinition;

    /// Protocol this client speaks
    fn protocol(&self) -> DownloadProtocol;

    /// Fetch the current queue and history snapshot, normalized and filtered
    ///
    /// Items outside the tracked category and titles the matcher does not
    /// recognize are excluded.
    ///
    /// # Errors
    ///
    /// Communication errors with the backend are handled internally; the
    /// reconciliation pass additionally treats a returned error like an
    /// empty snapshot.
    async fn get_items(&self) -> crate::Result<Vec<DownloadItem>>;

    /// Send a release to the backend
    ///
    /// Returns the download client item id the release will be reported
    /// under in subsequent `get_items` calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or rejects the
    /// release.
    async fn download(&self, release: &RemoteRelease) -> crate::Result<String>;

    /// Remove an item and its files from the backend
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or no longer
    /// knows the item.
    async fn remove_item(&self, id: &str) -> crate::Result<()>;

    /// Tell the backend to download the item again
    ///
    /// Returns the id the retried item is tracked under (backends keep
    /// the original id).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or no longer
    /// knows the item.
    async fn retry_download(&self, id: &str) -> crate::Result<String>;

    /// Probe connectivity and report the backend version
    async fn test(&self) -> ClientTestResult;
}

/// Base URL for a client backend, honoring TLS and url_base settings
pub(crate) fn client_base_url(config: &ClientConfig) -> crate::Result<Url> {
    let scheme = if config.use_tls { "https" } else { "http" };
    let mut raw = format!("{}://{}:{}/", scheme, config.host, config.port);
    if let Some(base) = &config.url_base {
        let trimmed = base.trim_matches('/');
        if !trimmed.is_empty() {
            raw.push_str(trimmed);
            raw.push('/');
        }
    }
    Url::parse(&raw).map_err(|e| Error::Config {
        message: format!("invalid URL for client \"{}\": {}", config.name, e),
        key: Some(format!("clients.{}.host", config.name)),
    })
}
