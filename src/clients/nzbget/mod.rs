//! NzbGet download client adapter
//!
//! Talks to NzbGet's JSON-RPC API (`/jsonrpc`, HTTP basic auth). Submitted
//! releases get a random `grabtrack` post-processing parameter whose value
//! becomes the item's id toward the tracker; NzbGet keeps the parameter
//! through queue, history, and redownload, so the id survives the numeric
//! NZBID changing meaning between the queue and history views.
//!
//! Requires NzbGet 16 or newer (`append` with parameters).

mod responses;

use crate::clients::{ClientDefinition, DownloadClient, DownloadProtocol, client_base_url};
use crate::config::{ClientConfig, GrabPriority};
use crate::error::{DownloadClientError, Error};
use crate::matcher::ReleaseMatcher;
use crate::types::{ClientTestResult, DownloadItem, DownloadItemStatus, RemoteRelease};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub use responses::{
    NzbgetHistoryItem, NzbgetParameter, NzbgetQueueItem, NzbgetRpcError, NzbgetRpcResponse,
};

use responses::make_i64;

/// Post-processing parameter carrying the tracker-assigned item id
pub const TRACKING_PARAMETER: &str = "grabtrack";

/// Statuses that do not fail a history item
const SUCCESS_STATUSES: [&str; 2] = ["SUCCESS", "NONE"];

/// Low-level NzbGet RPC surface
///
/// Split from the adapter so tests can script responses;
/// [`HttpNzbgetProxy`] is the real implementation.
#[async_trait]
pub trait NzbgetProxy: Send + Sync {
    /// Fetch the download queue (`listgroups`)
    async fn list_groups(&self) -> Result<Vec<NzbgetQueueItem>, DownloadClientError>;

    /// Fetch the history (`history`)
    async fn history(&self) -> Result<Vec<NzbgetHistoryItem>, DownloadClientError>;

    /// Add an NZB by URL (`append`); returns the assigned NZBID, 0 on failure
    async fn append(
        &self,
        file_name: &str,
        content_url: &str,
        category: Option<&str>,
        priority: i32,
        parameters: &[NzbgetParameter],
    ) -> Result<i64, DownloadClientError>;

    /// Apply a queue/history edit command to the given NZBIDs (`editqueue`)
    async fn edit_queue(&self, command: &str, ids: &[i64]) -> Result<bool, DownloadClientError>;

    /// Fetch the backend version (`version`)
    async fn version(&self) -> Result<String, DownloadClientError>;
}

/// [`NzbgetProxy`] implementation over HTTP
pub struct HttpNzbgetProxy {
    name: String,
    rpc_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpNzbgetProxy {
    /// Build a proxy for the given client definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the host does not form a valid
    /// URL or the HTTP client cannot be constructed.
    pub fn from_config(config: &ClientConfig, timeout: Duration) -> crate::Result<Self> {
        let rpc_url = client_base_url(config)?
            .join("jsonrpc")
            .map_err(|e| Error::Config {
                message: format!("invalid URL for client \"{}\": {}", config.name, e),
                key: Some(format!("clients.{}.host", config.name)),
            })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;

        Ok(Self {
            name: config.name.clone(),
            rpc_url,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
            http,
        })
    }

    /// Issue one RPC call and decode the result out of the envelope
    async fn call<T: DeserializeOwned + Default>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, DownloadClientError> {
        let body = serde_json::json!({ "method": method, "params": params });

        let mut request = self.http.post(self.rpc_url.clone()).json(&body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadClientError::Timeout {
                    name: self.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                DownloadClientError::ConnectionFailed {
                    name: self.name.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DownloadClientError::AuthenticationFailed {
                name: self.name.clone(),
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(DownloadClientError::Protocol {
                name: self.name.clone(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DownloadClientError::ConnectionFailed {
                name: self.name.clone(),
                message: e.to_string(),
            })?;

        let envelope: NzbgetRpcResponse<T> = serde_json::from_str(&body)
            .map_err(|e| DownloadClientError::Protocol {
                name: self.name.clone(),
                message: format!("invalid JSON-RPC response to {}: {}", method, e),
            })?;

        if let Some(error) = envelope.error {
            if error.name.contains("AUTHORIZATION") {
                return Err(DownloadClientError::AuthenticationFailed {
                    name: self.name.clone(),
                    message: error.name,
                });
            }
            return Err(DownloadClientError::Protocol {
                name: self.name.clone(),
                message: format!("{} (code {})", error.name, error.code),
            });
        }

        envelope
            .result
            .ok_or_else(|| DownloadClientError::Protocol {
                name: self.name.clone(),
                message: format!("empty result for {}", method),
            })
    }
}

#[async_trait]
impl NzbgetProxy for HttpNzbgetProxy {
    async fn list_groups(&self) -> Result<Vec<NzbgetQueueItem>, DownloadClientError> {
        self.call("listgroups", serde_json::json!([])).await
    }

    async fn history(&self) -> Result<Vec<NzbgetHistoryItem>, DownloadClientError> {
        self.call("history", serde_json::json!([])).await
    }

    async fn append(
        &self,
        file_name: &str,
        content_url: &str,
        category: Option<&str>,
        priority: i32,
        parameters: &[NzbgetParameter],
    ) -> Result<i64, DownloadClientError> {
        // append(NZBFilename, Content, Category, Priority, AddToTop,
        //        AddPaused, DupeKey, DupeScore, DupeMode, PPParameters);
        // Content may be a URL, which NzbGet fetches itself
        let params = serde_json::json!([
            file_name,
            content_url,
            category.unwrap_or(""),
            priority,
            false,
            false,
            "",
            0,
            "SCORE",
            parameters,
        ]);
        self.call("append", params).await
    }

    async fn edit_queue(&self, command: &str, ids: &[i64]) -> Result<bool, DownloadClientError> {
        self.call("editqueue", serde_json::json!([command, "", ids]))
            .await
    }

    async fn version(&self) -> Result<String, DownloadClientError> {
        self.call("version", serde_json::json!([])).await
    }
}

/// Where an NzbGet item currently lives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemLocation {
    Queue,
    History,
}

/// [`DownloadClient`] adapter for NzbGet
pub struct NzbgetClient {
    definition: ClientDefinition,
    recent_priority: GrabPriority,
    older_priority: GrabPriority,
    recent_age_days: i64,
    proxy: Arc<dyn NzbgetProxy>,
    matcher: Arc<dyn ReleaseMatcher>,
}

impl NzbgetClient {
    /// Build an adapter talking to a real NzbGet instance
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client definition is
    /// incomplete (invalid host).
    pub fn from_config(
        config: &ClientConfig,
        matcher: Arc<dyn ReleaseMatcher>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let proxy = HttpNzbgetProxy::from_config(config, timeout)?;
        Ok(Self::new(config, Arc::new(proxy), matcher))
    }

    /// Build an adapter around an existing proxy
    pub fn new(
        config: &ClientConfig,
        proxy: Arc<dyn NzbgetProxy>,
        matcher: Arc<dyn ReleaseMatcher>,
    ) -> Self {
        Self {
            definition: ClientDefinition::from(config),
            recent_priority: config.recent_priority,
            older_priority: config.older_priority,
            recent_age_days: config.recent_age_days,
            proxy,
            matcher,
        }
    }

    /// Whether a reported item belongs to the tracked category
    fn in_tracked_category(&self, category: &Option<String>) -> bool {
        self.definition.category == *category
    }

    /// Whether the matcher recognizes the title; logs the skip if not
    fn title_is_tracked(&self, id: &str, title: &str) -> bool {
        if self.matcher.matches(title) {
            return true;
        }
        debug!(
            client = %self.definition.name,
            id = %id,
            title = %title,
            "skipping item with unrecognized title"
        );
        false
    }

    fn queue_item(&self, item: &NzbgetQueueItem) -> DownloadItem {
        let total_size = make_i64(item.file_size_hi, item.file_size_lo);
        let remaining_size = make_i64(item.remaining_size_hi, item.remaining_size_lo);
        let paused_size = make_i64(item.paused_size_hi, item.paused_size_lo);

        let status = if total_size == paused_size {
            DownloadItemStatus::Paused
        } else if item.active_downloads == 0 && remaining_size != 0 {
            DownloadItemStatus::Queued
        } else {
            DownloadItemStatus::Downloading
        };

        DownloadItem {
            download_client_id: public_id(&item.parameters, item.nzb_id),
            client_id: self.definition.id,
            client_name: self.definition.name.clone(),
            title: item.nzb_name.clone(),
            category: normalize_category(&item.category),
            total_size: total_size.max(0) as u64,
            remaining_size: remaining_size.max(0) as u64,
            remaining_time: None,
            output_path: None,
            status,
            message: None,
        }
    }

    fn history_item(&self, item: &NzbgetHistoryItem) -> DownloadItem {
        let stage_ok = |status: &str| SUCCESS_STATUSES.contains(&status);

        let status = if !stage_ok(&item.par_status)
            || !stage_ok(&item.unpack_status)
            || !stage_ok(&item.move_status)
            || !stage_ok(&item.script_status)
            || !stage_ok(&item.delete_status)
            || !stage_ok(&item.mark_status)
        {
            DownloadItemStatus::Failed
        } else if item.move_status != "SUCCESS" {
            // Still waiting for the move into the destination directory
            DownloadItemStatus::Queued
        } else {
            DownloadItemStatus::Completed
        };

        let message = format!(
            "PAR Status: {} - Unpack Status: {} - Move Status: {} - Script Status: {} - Delete Status: {} - Mark Status: {}",
            item.par_status,
            item.unpack_status,
            item.move_status,
            item.script_status,
            item.delete_status,
            item.mark_status,
        );

        DownloadItem {
            download_client_id: public_id(&item.parameters, item.nzb_id),
            client_id: self.definition.id,
            client_name: self.definition.name.clone(),
            title: item.name.clone(),
            category: normalize_category(&item.category),
            total_size: make_i64(item.file_size_hi, item.file_size_lo).max(0) as u64,
            remaining_size: 0,
            remaining_time: None,
            output_path: (!item.dest_dir.is_empty()).then(|| PathBuf::from(&item.dest_dir)),
            status,
            message: Some(message),
        }
    }

    /// Find the NZBID behind a tracker-facing item id
    ///
    /// The id is matched against the `grabtrack` parameter first and the
    /// numeric NZBID as a fallback (items added outside the tracker).
    async fn resolve_id(&self, id: &str) -> crate::Result<(i64, ItemLocation)> {
        let groups = self.proxy.list_groups().await?;
        if let Some(item) = groups
            .iter()
            .find(|item| item_matches_id(&item.parameters, item.nzb_id, id))
        {
            return Ok((item.nzb_id, ItemLocation::Queue));
        }

        let history = self.proxy.history().await?;
        if let Some(item) = history
            .iter()
            .find(|item| item_matches_id(&item.parameters, item.nzb_id, id))
        {
            return Ok((item.nzb_id, ItemLocation::History));
        }

        Err(DownloadClientError::ItemNotFound {
            name: self.definition.name.clone(),
            id: id.to_string(),
        }
        .into())
    }
}

#[async_trait]
impl DownloadClient for NzbgetClient {
    fn definition(&self) -> &ClientDefinition {
        &self.definition
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    async fn get_items(&self) -> crate::Result<Vec<DownloadItem>> {
        // Queue and history are fetched independently so one failing
        // section does not blank out the other
        let groups = match self.proxy.list_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(client = %self.definition.name, error = %e, "failed to fetch queue");
                Vec::new()
            }
        };
        let history = match self.proxy.history().await {
            Ok(history) => history,
            Err(e) => {
                warn!(client = %self.definition.name, error = %e, "failed to fetch history");
                Vec::new()
            }
        };

        let mut items = Vec::with_capacity(groups.len() + history.len());
        for item in &groups {
            if !self.in_tracked_category(&normalize_category(&item.category)) {
                continue;
            }
            let id = public_id(&item.parameters, item.nzb_id);
            if !self.title_is_tracked(&id, &item.nzb_name) {
                continue;
            }
            items.push(self.queue_item(item));
        }
        for item in &history {
            if !self.in_tracked_category(&normalize_category(&item.category)) {
                continue;
            }
            let id = public_id(&item.parameters, item.nzb_id);
            if !self.title_is_tracked(&id, &item.name) {
                continue;
            }
            items.push(self.history_item(item));
        }

        Ok(items)
    }

    async fn download(&self, release: &RemoteRelease) -> crate::Result<String> {
        let priority = if release.is_recent(self.recent_age_days) {
            self.recent_priority
        } else {
            self.older_priority
        };

        // The random parameter value is the id this item is tracked under
        let tracking_value = format!("{:032x}", rand::random::<u128>());
        let parameters = [NzbgetParameter {
            name: TRACKING_PARAMETER.to_string(),
            value: tracking_value.clone(),
        }];

        let nzb_id = self
            .proxy
            .append(
                &format!("{}.nzb", release.title),
                &release.download_url,
                self.definition.category.as_deref(),
                nzbget_priority(priority),
                &parameters,
            )
            .await?;

        if nzb_id <= 0 {
            return Err(DownloadClientError::DownloadRejected {
                name: self.definition.name.clone(),
                title: release.title.clone(),
                message: format!("append returned {}", nzb_id),
            }
            .into());
        }

        debug!(
            client = %self.definition.name,
            nzb_id = nzb_id,
            id = %tracking_value,
            title = %release.title,
            "added release to NzbGet"
        );
        Ok(tracking_value)
    }

    async fn remove_item(&self, id: &str) -> crate::Result<()> {
        let (nzb_id, location) = self.resolve_id(id).await?;
        let command = match location {
            ItemLocation::Queue => "GroupDelete",
            ItemLocation::History => "HistoryDelete",
        };

        if !self.proxy.edit_queue(command, &[nzb_id]).await? {
            return Err(DownloadClientError::ItemNotFound {
                name: self.definition.name.clone(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn retry_download(&self, id: &str) -> crate::Result<String> {
        let (nzb_id, location) = self.resolve_id(id).await?;
        if location != ItemLocation::History {
            return Err(DownloadClientError::ItemNotFound {
                name: self.definition.name.clone(),
                id: id.to_string(),
            }
            .into());
        }

        if !self.proxy.edit_queue("HistoryRedownload", &[nzb_id]).await? {
            return Err(DownloadClientError::ItemNotFound {
                name: self.definition.name.clone(),
                id: id.to_string(),
            }
            .into());
        }
        // The tracking parameter survives the redownload, so the item
        // keeps its id
        Ok(id.to_string())
    }

    async fn test(&self) -> ClientTestResult {
        let started = Instant::now();
        match self.proxy.version().await {
            Ok(version) => ClientTestResult {
                success: true,
                latency: Some(started.elapsed()),
                error: None,
                version: Some(version),
            },
            Err(e) => ClientTestResult {
                success: false,
                latency: None,
                error: Some(e.to_string()),
                version: None,
            },
        }
    }
}

/// Map a priority tier to NzbGet's numeric scale
pub(crate) fn nzbget_priority(priority: GrabPriority) -> i32 {
    match priority {
        GrabPriority::Low => -50,
        GrabPriority::Normal => 0,
        GrabPriority::High => 50,
        GrabPriority::Force => 900,
    }
}

/// NzbGet reports uncategorized items as ""
fn normalize_category(category: &str) -> Option<String> {
    if category.is_empty() {
        None
    } else {
        Some(category.to_string())
    }
}

/// Tracker-facing id: the `grabtrack` parameter value when present,
/// the numeric NZBID otherwise
fn public_id(parameters: &[NzbgetParameter], nzb_id: i64) -> String {
    parameters
        .iter()
        .find(|parameter| parameter.name == TRACKING_PARAMETER)
        .map(|parameter| parameter.value.clone())
        .unwrap_or_else(|| nzb_id.to_string())
}

fn item_matches_id(parameters: &[NzbgetParameter], nzb_id: i64, id: &str) -> bool {
    public_id(parameters, nzb_id) == id
}
