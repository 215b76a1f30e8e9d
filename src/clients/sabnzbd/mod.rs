//! SABnzbd download client adapter
//!
//! Talks to SABnzbd's JSON API (`/api?mode=...&output=json`). The adapter
//! merges the queue and history reports into one normalized item list,
//! filtered to the configured category and the matcher's catalog.

mod responses;

use crate::clients::{ClientDefinition, DownloadClient, DownloadProtocol, client_base_url};
use crate::config::{ClientConfig, GrabPriority};
use crate::error::{DownloadClientError, Error};
use crate::matcher::ReleaseMatcher;
use crate::types::{ClientTestResult, DownloadItem, DownloadItemStatus, RemoteRelease};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub use responses::{
    SabnzbdAddResponse, SabnzbdHistory, SabnzbdHistoryResponse, SabnzbdHistorySlot, SabnzbdQueue,
    SabnzbdQueueResponse, SabnzbdQueueSlot, SabnzbdResult,
};

use responses::{SabnzbdVersionResponse, parse_megabytes, parse_timeleft};

/// Low-level SABnzbd API surface
///
/// Split from the adapter so tests can script responses;
/// [`HttpSabnzbdProxy`] is the real implementation.
#[async_trait]
pub trait SabnzbdProxy: Send + Sync {
    /// Fetch the current queue (`mode=queue`)
    async fn get_queue(&self) -> Result<SabnzbdQueueResponse, DownloadClientError>;

    /// Fetch the history (`mode=history`)
    async fn get_history(&self) -> Result<SabnzbdHistoryResponse, DownloadClientError>;

    /// Add an NZB by URL (`mode=addurl`)
    async fn add_url(
        &self,
        url: &str,
        nzb_name: &str,
        category: Option<&str>,
        priority: i32,
    ) -> Result<SabnzbdAddResponse, DownloadClientError>;

    /// Delete a queue item, optionally with its files (`mode=queue&name=delete`)
    async fn remove_queue_item(
        &self,
        id: &str,
        delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError>;

    /// Delete a history item, optionally with its files (`mode=history&name=delete`)
    async fn remove_history_item(
        &self,
        id: &str,
        delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError>;

    /// Requeue a failed history item (`mode=retry`)
    async fn retry_item(&self, id: &str) -> Result<SabnzbdResult, DownloadClientError>;

    /// Fetch the backend version (`mode=version`)
    async fn get_version(&self) -> Result<String, DownloadClientError>;
}

/// SABnzbd reports authentication failures inside a 200 body
#[derive(Deserialize)]
struct SabnzbdErrorProbe {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// [`SabnzbdProxy`] implementation over HTTP
pub struct HttpSabnzbdProxy {
    name: String,
    base_url: Url,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpSabnzbdProxy {
    /// Build a proxy for the given client definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the API key is missing or the
    /// host does not form a valid URL.
    pub fn from_config(config: &ClientConfig, timeout: Duration) -> crate::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| Error::Config {
            message: format!("SABnzbd client \"{}\" requires an api_key", config.name),
            key: Some(format!("clients.{}.api_key", config.name)),
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
            base_url: client_base_url(config)?,
            api_key,
            timeout,
            http,
        })
    }

    /// Issue one API call and decode the JSON response
    async fn call<T: DeserializeOwned>(
        &self,
        mode: &str,
        params: &[(&str, &str)],
    ) -> Result<T, DownloadClientError> {
        let mut url = self
            .base_url
            .join("api")
            .map_err(|e| DownloadClientError::Protocol {
                name: self.name.clone(),
                message: format!("invalid API URL: {}", e),
            })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("mode", mode)
                .append_pair("output", "json")
                .append_pair("apikey", &self.api_key);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        let response = self.http.get(url).send().await.map_err(|e| {
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

        // Bad API keys come back as 200 with {"status": false, "error": ...}
        let probe = serde_json::from_str::<SabnzbdErrorProbe>(&body).ok();
        if let Some(probe) = &probe {
            if probe.status == Some(false) {
                if let Some(message) = &probe.error {
                    if message.to_ascii_lowercase().contains("api key") {
                        return Err(DownloadClientError::AuthenticationFailed {
                            name: self.name.clone(),
                            message: message.clone(),
                        });
                    }
                }
            }
        }

        serde_json::from_str(&body).map_err(|e| {
            // When the body is an error envelope rather than the expected
            // shape, surface the backend's own message
            let message = match probe.and_then(|probe| probe.error) {
                Some(error) => error,
                None => format!("invalid JSON response to mode={}: {}", mode, e),
            };
            DownloadClientError::Protocol {
                name: self.name.clone(),
                message,
            }
        })
    }
}

#[async_trait]
impl SabnzbdProxy for HttpSabnzbdProxy {
    async fn get_queue(&self) -> Result<SabnzbdQueueResponse, DownloadClientError> {
        self.call("queue", &[]).await
    }

    async fn get_history(&self) -> Result<SabnzbdHistoryResponse, DownloadClientError> {
        self.call("history", &[]).await
    }

    async fn add_url(
        &self,
        url: &str,
        nzb_name: &str,
        category: Option<&str>,
        priority: i32,
    ) -> Result<SabnzbdAddResponse, DownloadClientError> {
        let priority = priority.to_string();
        let mut params = vec![
            ("name", url),
            ("nzbname", nzb_name),
            ("priority", priority.as_str()),
        ];
        if let Some(category) = category {
            params.push(("cat", category));
        }
        self.call("addurl", &params).await
    }

    async fn remove_queue_item(
        &self,
        id: &str,
        delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError> {
        let del_files = if delete_files { "1" } else { "0" };
        self.call(
            "queue",
            &[("name", "delete"), ("value", id), ("del_files", del_files)],
        )
        .await
    }

    async fn remove_history_item(
        &self,
        id: &str,
        delete_files: bool,
    ) -> Result<SabnzbdResult, DownloadClientError> {
        let del_files = if delete_files { "1" } else { "0" };
        self.call(
            "history",
            &[("name", "delete"), ("value", id), ("del_files", del_files)],
        )
        .await
    }

    async fn retry_item(&self, id: &str) -> Result<SabnzbdResult, DownloadClientError> {
        self.call("retry", &[("value", id)]).await
    }

    async fn get_version(&self) -> Result<String, DownloadClientError> {
        let response: SabnzbdVersionResponse = self.call("version", &[]).await?;
        Ok(response.version)
    }
}

/// [`DownloadClient`] adapter for SABnzbd
pub struct SabnzbdClient {
    definition: ClientDefinition,
    recent_priority: GrabPriority,
    older_priority: GrabPriority,
    recent_age_days: i64,
    proxy: Arc<dyn SabnzbdProxy>,
    matcher: Arc<dyn ReleaseMatcher>,
}

impl SabnzbdClient {
    /// Build an adapter talking to a real SABnzbd instance
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client definition is
    /// incomplete (missing API key, invalid host).
    pub fn from_config(
        config: &ClientConfig,
        matcher: Arc<dyn ReleaseMatcher>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let proxy = HttpSabnzbdProxy::from_config(config, timeout)?;
        Ok(Self::new(config, Arc::new(proxy), matcher))
    }

    /// Build an adapter around an existing proxy
    pub fn new(
        config: &ClientConfig,
        proxy: Arc<dyn SabnzbdProxy>,
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
    ///
    /// Without a configured category only uncategorized items match.
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

    fn queue_item(&self, slot: &SabnzbdQueueSlot, queue_paused: bool) -> DownloadItem {
        let mut status = match slot.status.as_str() {
            "Paused" => DownloadItemStatus::Paused,
            "Queued" | "Grabbing" => DownloadItemStatus::Queued,
            // Checking, Downloading, QuickCheck, Verifying, Repairing,
            // Fetching, Extracting, Moving, Running
            _ => DownloadItemStatus::Downloading,
        };
        if queue_paused && status == DownloadItemStatus::Queued {
            status = DownloadItemStatus::Paused;
        }

        DownloadItem {
            download_client_id: slot.nzo_id.clone(),
            client_id: self.definition.id,
            client_name: self.definition.name.clone(),
            title: slot.filename.clone(),
            category: normalize_category(&slot.cat),
            total_size: parse_megabytes(&slot.mb),
            remaining_size: parse_megabytes(&slot.mbleft),
            remaining_time: parse_timeleft(&slot.timeleft),
            output_path: None,
            status,
            message: None,
        }
    }

    fn history_item(&self, slot: &SabnzbdHistorySlot) -> DownloadItem {
        let status = match slot.status.as_str() {
            "Failed" => DownloadItemStatus::Failed,
            "Completed" => DownloadItemStatus::Completed,
            // Post-processing stages (Verifying, Repairing, Extracting, ...)
            _ => DownloadItemStatus::Downloading,
        };

        DownloadItem {
            download_client_id: slot.nzo_id.clone(),
            client_id: self.definition.id,
            client_name: self.definition.name.clone(),
            title: slot.name.clone(),
            category: normalize_category(&slot.category),
            total_size: slot.bytes,
            remaining_size: 0,
            remaining_time: None,
            output_path: (!slot.storage.is_empty()).then(|| PathBuf::from(&slot.storage)),
            status,
            message: (!slot.fail_message.is_empty()).then(|| slot.fail_message.clone()),
        }
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn definition(&self) -> &ClientDefinition {
        &self.definition
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    async fn get_items(&self) -> crate::Result<Vec<DownloadItem>> {
        // Queue and history are fetched independently so one failing
        // section does not blank out the other
        let queue = match self.proxy.get_queue().await {
            Ok(response) => response.queue,
            Err(e) => {
                warn!(client = %self.definition.name, error = %e, "failed to fetch queue");
                SabnzbdQueue::default()
            }
        };
        let history = match self.proxy.get_history().await {
            Ok(response) => response.history,
            Err(e) => {
                warn!(client = %self.definition.name, error = %e, "failed to fetch history");
                SabnzbdHistory::default()
            }
        };

        let mut items = Vec::with_capacity(queue.slots.len() + history.slots.len());
        for slot in &queue.slots {
            if !self.in_tracked_category(&normalize_category(&slot.cat)) {
                continue;
            }
            if !self.title_is_tracked(&slot.nzo_id, &slot.filename) {
                continue;
            }
            items.push(self.queue_item(slot, queue.paused));
        }
        // History last: for items mid-handoff the history report wins
        // when the reconciliation merge sees both
        for slot in &history.slots {
            if !self.in_tracked_category(&normalize_category(&slot.category)) {
                continue;
            }
            if !self.title_is_tracked(&slot.nzo_id, &slot.name) {
                continue;
            }
            items.push(self.history_item(slot));
        }

        Ok(items)
    }

    async fn download(&self, release: &RemoteRelease) -> crate::Result<String> {
        let priority = if release.is_recent(self.recent_age_days) {
            self.recent_priority
        } else {
            self.older_priority
        };

        let response = self
            .proxy
            .add_url(
                &release.download_url,
                &release.title,
                self.definition.category.as_deref(),
                sab_priority(priority),
            )
            .await?;

        if !response.status {
            return Err(DownloadClientError::DownloadRejected {
                name: self.definition.name.clone(),
                title: release.title.clone(),
                message: response.error.unwrap_or_else(|| "unknown error".into()),
            }
            .into());
        }

        match response.nzo_ids.first() {
            Some(id) => {
                debug!(
                    client = %self.definition.name,
                    id = %id,
                    title = %release.title,
                    "added release to SABnzbd"
                );
                Ok(id.clone())
            }
            None => Err(DownloadClientError::DownloadRejected {
                name: self.definition.name.clone(),
                title: release.title.clone(),
                message: "no nzo id returned".into(),
            }
            .into()),
        }
    }

    async fn remove_item(&self, id: &str) -> crate::Result<()> {
        // Finished items live in history, everything else in the queue
        let in_queue = self
            .proxy
            .get_queue()
            .await?
            .queue
            .slots
            .iter()
            .any(|slot| slot.nzo_id == id);

        let result = if in_queue {
            self.proxy.remove_queue_item(id, true).await?
        } else {
            self.proxy.remove_history_item(id, true).await?
        };

        if !result.status {
            return Err(DownloadClientError::ItemNotFound {
                name: self.definition.name.clone(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn retry_download(&self, id: &str) -> crate::Result<String> {
        let result = self.proxy.retry_item(id).await?;
        if !result.status {
            return Err(DownloadClientError::ItemNotFound {
                name: self.definition.name.clone(),
                id: id.to_string(),
            }
            .into());
        }
        // SABnzbd requeues under the same nzo id
        Ok(id.to_string())
    }

    async fn test(&self) -> ClientTestResult {
        let started = Instant::now();
        match self.proxy.get_version().await {
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

/// Map a priority tier to SABnzbd's numeric scale
pub(crate) fn sab_priority(priority: GrabPriority) -> i32 {
    match priority {
        GrabPriority::Low => -1,
        GrabPriority::Normal => 0,
        GrabPriority::High => 1,
        GrabPriority::Force => 2,
    }
}

/// SABnzbd reports uncategorized items as "*"
fn normalize_category(category: &str) -> Option<String> {
    if category.is_empty() || category == "*" {
        None
    } else {
        Some(category.to_string())
    }
}
