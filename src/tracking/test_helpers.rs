//! Test doubles for exercising the tracker without real backends
//!
//! `FakeTrackingClient` reports whatever items a test loads into it,
//! `MemoryHistory` stands in for the SQLite store, and
//! `RecordingImportHandler` captures import calls. `TrackerHarness`
//! wires them into a real `DownloadTracker`.

use crate::clients::registry::ClientRegistry;
use crate::clients::{ClientDefinition, DownloadClient, DownloadProtocol};
use crate::config::{ClientKind, TrackingConfig};
use crate::db::{HistoryStore, NewHistoryRow};
use crate::error::{DatabaseError, DownloadClientError, ImportError};
use crate::import::ImportHandler;
use crate::types::{
    ClientId, ClientTestResult, DownloadItem, DownloadItemStatus, HistoryEventType, HistoryRecord,
    RemoteRelease, TrackedDownload, TrackingId, history_data,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::DownloadTracker;

/// Scripted download client: reports whatever items a test loads
pub(crate) struct FakeTrackingClient {
    definition: ClientDefinition,
    items: Mutex<Vec<DownloadItem>>,
    delay: Mutex<Option<Duration>>,
    unreachable: AtomicBool,
    fail_removals: AtomicBool,
    next_download_id: AtomicI64,
    /// Titles handed to `download`, in order
    pub(crate) grabs: Mutex<Vec<String>>,
    /// Item ids handed to `remove_item`, in order
    pub(crate) removed: Mutex<Vec<String>>,
    /// Item ids handed to `retry_download`, in order
    pub(crate) retried: Mutex<Vec<String>>,
}

impl FakeTrackingClient {
    pub(crate) fn new(id: i64) -> Self {
        Self {
            definition: ClientDefinition {
                id: ClientId::new(id),
                name: format!("fake-{id}"),
                kind: ClientKind::Sabnzbd,
                enable: true,
                category: Some("tv".to_string()),
            },
            items: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            unreachable: AtomicBool::new(false),
            fail_removals: AtomicBool::new(false),
            next_download_id: AtomicI64::new(1),
            grabs: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            retried: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn disabled(id: i64) -> Self {
        let mut client = Self::new(id);
        client.definition.enable = false;
        client
    }

    /// Replace the items reported by subsequent polls
    pub(crate) fn set_items(&self, items: Vec<DownloadItem>) {
        *self.items.lock().unwrap() = items;
    }

    /// Make every poll sleep before answering
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    /// Build an item as this client would report it
    pub(crate) fn item(
        &self,
        download_client_id: &str,
        title: &str,
        status: DownloadItemStatus,
    ) -> DownloadItem {
        DownloadItem {
            download_client_id: download_client_id.to_string(),
            client_id: self.definition.id,
            client_name: self.definition.name.clone(),
            title: title.to_string(),
            category: Some("tv".to_string()),
            total_size: 1_000,
            remaining_size: if status == DownloadItemStatus::Completed {
                0
            } else {
                10
            },
            remaining_time: None,
            output_path: (status == DownloadItemStatus::Completed)
                .then(|| PathBuf::from(format!("/downloads/complete/{title}"))),
            status,
            message: (status == DownloadItemStatus::Failed)
                .then(|| "download failed".to_string()),
        }
    }

    fn connection_error(&self) -> crate::error::Error {
        DownloadClientError::ConnectionFailed {
            name: self.definition.name.clone(),
            message: "connection refused".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl DownloadClient for FakeTrackingClient {
    fn definition(&self) -> &ClientDefinition {
        &self.definition
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    async fn get_items(&self) -> crate::Result<Vec<DownloadItem>> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(self.connection_error());
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn download(&self, release: &RemoteRelease) -> crate::Result<String> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(self.connection_error());
        }
        self.grabs.lock().unwrap().push(release.title.clone());
        let n = self.next_download_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("fake_nzo_{n}"))
    }

    async fn remove_item(&self, id: &str) -> crate::Result<()> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(self.connection_error());
        }
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn retry_download(&self, id: &str) -> crate::Result<String> {
        self.retried.lock().unwrap().push(id.to_string());
        Ok(id.to_string())
    }

    async fn test(&self) -> ClientTestResult {
        ClientTestResult {
            success: true,
            latency: Some(Duration::from_millis(1)),
            error: None,
            version: Some("0.0.0".to_string()),
        }
    }
}

/// In-memory history store
///
/// Rows get ids in insertion order; reads return most recent first like
/// the SQLite implementation.
pub(crate) struct MemoryHistory {
    rows: Mutex<Vec<HistoryRecord>>,
    next_id: AtomicI64,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryHistory {
    pub(crate) fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Seed a grabbed row the way `DownloadTracker::grab` writes it
    pub(crate) fn push_grabbed(&self, client_id: ClientId, download_client_id: &str, title: &str) {
        let mut data = HashMap::new();
        data.insert(history_data::DOWNLOAD_CLIENT.to_string(), "fake".to_string());
        data.insert(
            history_data::DOWNLOAD_CLIENT_ID.to_string(),
            download_client_id.to_string(),
        );
        self.push(HistoryEventType::Grabbed, title, Some(client_id), data);
    }

    fn push(
        &self,
        event: HistoryEventType,
        title: &str,
        client_id: Option<ClientId>,
        data: HashMap<String, String>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(HistoryRecord {
            id,
            event,
            source_title: title.to_string(),
            category: Some("tv".to_string()),
            client_id,
            date: Utc::now(),
            data,
        });
    }

    /// Stored rows of one event kind, most recent first
    pub(crate) fn rows_of(&self, event: HistoryEventType) -> Vec<HistoryRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|row| row.event == event)
            .cloned()
            .collect()
    }

    fn read(&self, event: HistoryEventType) -> crate::Result<Vec<HistoryRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("disk I/O error".to_string()).into());
        }
        Ok(self.rows_of(event))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn grabbed(&self) -> crate::Result<Vec<HistoryRecord>> {
        self.read(HistoryEventType::Grabbed)
    }

    async fn failed(&self) -> crate::Result<Vec<HistoryRecord>> {
        self.read(HistoryEventType::Failed)
    }

    async fn imported(&self) -> crate::Result<Vec<HistoryRecord>> {
        self.read(HistoryEventType::Imported)
    }

    async fn record(&self, row: &NewHistoryRow) -> crate::Result<i64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("disk I/O error".to_string()).into());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(HistoryRecord {
            id,
            event: row.event,
            source_title: row.source_title.clone(),
            category: row.category.clone(),
            client_id: row.client_id,
            date: Utc::now(),
            data: row.data.clone(),
        });
        Ok(id)
    }
}

/// Import handler that records every call
pub(crate) struct RecordingImportHandler {
    fail: AtomicBool,
    /// Tracking key and output path of every successful import, in order
    pub(crate) imported: Mutex<Vec<(TrackingId, PathBuf)>>,
}

impl RecordingImportHandler {
    pub(crate) fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            imported: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn import_count(&self) -> usize {
        self.imported.lock().unwrap().len()
    }
}

#[async_trait]
impl ImportHandler for RecordingImportHandler {
    async fn import(&self, download: &TrackedDownload) -> crate::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImportError::Failed {
                title: download.item.title.clone(),
                reason: "destination full".to_string(),
            }
            .into());
        }
        let path = download.item.output_path.clone().unwrap_or_default();
        self.imported
            .lock()
            .unwrap()
            .push((download.id.clone(), path));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A tracker wired to fake clients, in-memory history, and a recording
/// import handler
pub(crate) struct TrackerHarness {
    pub(crate) tracker: Arc<DownloadTracker>,
    pub(crate) clients: Vec<Arc<FakeTrackingClient>>,
    pub(crate) history: Arc<MemoryHistory>,
    pub(crate) imports: Arc<RecordingImportHandler>,
}

impl TrackerHarness {
    /// The first (usually only) fake client
    pub(crate) fn client(&self) -> &FakeTrackingClient {
        &self.clients[0]
    }
}

pub(crate) fn harness() -> TrackerHarness {
    harness_with(TrackingConfig::default())
}

pub(crate) fn harness_with(config: TrackingConfig) -> TrackerHarness {
    harness_with_clients(vec![Arc::new(FakeTrackingClient::new(1))], config)
}

pub(crate) fn harness_with_clients(
    clients: Vec<Arc<FakeTrackingClient>>,
    config: TrackingConfig,
) -> TrackerHarness {
    let history = Arc::new(MemoryHistory::new());
    let imports = Arc::new(RecordingImportHandler::new());
    let adapters: Vec<Arc<dyn DownloadClient>> = clients
        .iter()
        .map(|client| client.clone() as Arc<dyn DownloadClient>)
        .collect();
    let tracker = Arc::new(DownloadTracker::new(
        Arc::new(ClientRegistry::new(adapters)),
        history.clone(),
        imports.clone(),
        config,
    ));

    TrackerHarness {
        tracker,
        clients,
        history,
        imports,
    }
}
