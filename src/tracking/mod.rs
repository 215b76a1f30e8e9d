//! Download tracking core split into focused submodules.
//!
//! The `DownloadTracker` struct and its methods are organized by domain:
//! - [`store`] - Snapshot storage behind the read API
//! - [`reconcile`] - The poll/merge/detect reconciliation pass
//! - [`failed`] - Failure detection and handling
//! - [`completed`] - Completion detection and import hand-off
//!
//! The tracker mirrors what the configured download clients report into
//! a set of tracked downloads keyed by [`TrackingId`], detects terminal
//! outcomes against the grab history, and broadcasts change events.
//! Passes are serialized; reads are lock-free snapshot clones.

mod completed;
mod failed;
mod reconcile;
mod store;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::clients::registry::ClientRegistry;
use crate::config::TrackingConfig;
use crate::db::{HistoryStore, NewHistoryRow};
use crate::error::Error;
use crate::import::ImportHandler;
use crate::types::{
    DownloadItem, DownloadItemStatus, Event, HistoryEventType, HistoryRecord, RemoteRelease,
    TrackedDownload, TrackedState, TrackingId, TrackingStats, history_data,
};
use completed::CompletedDownloadService;
use failed::FailedDownloadService;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use store::TrackedDownloadStore;

/// How long the queued view may be served from cache
pub(crate) const QUEUED_VIEW_TTL: Duration = Duration::from_secs(5);

/// Reconciles download client reports into tracked downloads
///
/// Built once at startup and shared via `Arc`. All state lives behind
/// the snapshot store; the tracker itself only serializes passes and
/// fans out events.
pub struct DownloadTracker {
    registry: Arc<ClientRegistry>,
    history: Arc<dyn HistoryStore>,
    store: TrackedDownloadStore,
    config: TrackingConfig,
    event_tx: broadcast::Sender<Event>,
    failed_service: FailedDownloadService,
    completed_service: CompletedDownloadService,
    /// Serializes reconciliation passes; the interval tick try-locks and
    /// skips, explicit triggers queue behind it
    process_lock: tokio::sync::Mutex<()>,
}

impl DownloadTracker {
    /// Create a tracker over the given clients, history store, and
    /// import handler
    pub fn new(
        registry: Arc<ClientRegistry>,
        history: Arc<dyn HistoryStore>,
        import_handler: Arc<dyn ImportHandler>,
        config: TrackingConfig,
    ) -> Self {
        // Buffered so slow subscribers do not stall the pass
        let (event_tx, _rx) = broadcast::channel(1000);

        let failed_service =
            FailedDownloadService::new(history.clone(), config.clone(), event_tx.clone());
        let completed_service =
            CompletedDownloadService::new(history.clone(), import_handler, event_tx.clone());

        Self {
            registry,
            history,
            store: TrackedDownloadStore::new(),
            config,
            event_tx,
            failed_service,
            completed_service,
            process_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribe to tracker events
    ///
    /// Multiple subscribers are supported; each receives every event. A
    /// subscriber that falls behind by more than the channel capacity
    /// sees `RecvError::Lagged` and can re-query the read API.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Send an event to whoever is listening; no subscribers is fine
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    // --- triggers ---

    /// Run one reconciliation pass, serialized with any other trigger
    pub async fn process(&self) {
        let _guard = self.process_lock.lock().await;
        self.run_pass().await;
    }

    /// Explicit "check now" trigger; the REST layer funnels here
    pub async fn check_now(&self) {
        self.process().await;
    }

    /// Reconcile once at startup so state left by the previous run
    /// converges before the first interval tick
    pub async fn handle_application_started(&self) {
        info!("reconciling tracked downloads at startup");
        self.process().await;
    }

    /// Reconcile after a release was handed to a client so the new item
    /// shows up without waiting for the next tick
    pub async fn handle_grab(&self) {
        self.process().await;
    }

    /// Start the periodic reconciliation loop
    ///
    /// Ticks at `config.tracking.interval`. A tick that lands while a
    /// triggered pass is still running is skipped rather than queued.
    /// The startup trigger covers the first pass, so the first tick
    /// fires one full interval in.
    pub fn spawn_poll_loop(self: &Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let period = tracker.config.interval;
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval_secs = period.as_secs(), "reconciliation loop started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match tracker.process_lock.try_lock() {
                            Ok(_guard) => tracker.run_pass().await,
                            Err(_) => debug!("reconciliation already in flight; skipping tick"),
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        info!("reconciliation loop stopped");
                        break;
                    }
                }
            }
        })
    }

    // --- grabbing ---

    /// Hand a release to the first enabled client for its protocol
    ///
    /// Records the grab in history, announces it, and runs a
    /// reconciliation pass so the new item is tracked immediately.
    /// Returns the tracking key the download will be reported under.
    ///
    /// # Errors
    ///
    /// Fails when no enabled client speaks the release's protocol, when
    /// the client rejects the release, or when the grab cannot be
    /// recorded in history.
    pub async fn grab(&self, release: &RemoteRelease) -> crate::Result<TrackingId> {
        let client = self
            .registry
            .first_for_protocol(release.protocol)
            .ok_or_else(|| Error::NoAvailableClient {
                protocol: release.protocol.to_string(),
            })?;

        let download_client_id = client.download(release).await?;
        let definition = client.definition();
        let id = TrackingId::new(definition.id, &download_client_id);

        info!(
            id = %id,
            client = %definition.name,
            title = %release.title,
            "sent release to download client"
        );

        let mut data = HashMap::new();
        data.insert(
            history_data::DOWNLOAD_CLIENT.to_string(),
            definition.name.clone(),
        );
        data.insert(
            history_data::DOWNLOAD_CLIENT_ID.to_string(),
            download_client_id,
        );
        self.history
            .record(&NewHistoryRow {
                event: HistoryEventType::Grabbed,
                source_title: release.title.clone(),
                category: definition.category.clone(),
                client_id: Some(definition.id),
                data,
            })
            .await?;

        self.emit(Event::Grabbed {
            id: id.clone(),
            title: release.title.clone(),
        });
        self.handle_grab().await;

        Ok(id)
    }

    // --- read API ---

    /// All tracked downloads, including removed ones
    pub async fn tracked_downloads(&self) -> Arc<Vec<TrackedDownload>> {
        self.store.all().await
    }

    /// Tracked downloads whose client reports them finished but whose
    /// import has not concluded
    pub async fn completed_downloads(&self) -> Vec<TrackedDownload> {
        self.store
            .all()
            .await
            .iter()
            .filter(|tracked| {
                tracked.state == TrackedState::Downloading
                    && tracked.item.status == DownloadItemStatus::Completed
            })
            .cloned()
            .collect()
    }

    /// The queued view: tracked downloads with work still pending
    ///
    /// Served from a short-lived cache; a stale cache recomputes the
    /// filter from the current tracked snapshot without polling clients.
    pub async fn queued_downloads(&self) -> Arc<Vec<TrackedDownload>> {
        let config = &self.config;
        self.store
            .queued_with(QUEUED_VIEW_TTL, |entries| {
                reconcile::queued_view(entries, config)
            })
            .await
    }

    /// Counts over the current snapshot
    pub async fn stats(&self) -> TrackingStats {
        let tracked = self.store.all().await;
        let queued = self.queued_downloads().await;

        TrackingStats {
            total: tracked.len(),
            unknown: count_state(&tracked, TrackedState::Unknown),
            downloading: count_state(&tracked, TrackedState::Downloading),
            removed: count_state(&tracked, TrackedState::Removed),
            queued: queued.len(),
            failures_recorded: tracked.iter().filter(|t| t.failure_recorded).count(),
            imports_recorded: tracked.iter().filter(|t| t.import_recorded).count(),
        }
    }

    /// The registry this tracker polls
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }
}

fn count_state(tracked: &[TrackedDownload], state: TrackedState) -> usize {
    tracked.iter().filter(|t| t.state == state).count()
}

/// Tracking key recorded on a history row, when the row carries one
///
/// Needs both the client definition id and the backend item id; rows
/// without either cannot be matched to a tracked download.
pub(crate) fn row_tracking_id(row: &HistoryRecord) -> Option<TrackingId> {
    let client_id = row.client_id?;
    let item_id = row.download_client_id()?;
    Some(TrackingId::new(client_id, item_id))
}

/// Whether any row refers to the given tracking key
pub(crate) fn history_contains(history: &[HistoryRecord], id: &TrackingId) -> bool {
    history
        .iter()
        .any(|row| row_tracking_id(row).as_ref() == Some(id))
}

/// The grabbed-history row for a tracking key, if this tracker grabbed it
pub(crate) fn grabbed_row_for<'a>(
    grabbed: &'a [HistoryRecord],
    id: &TrackingId,
) -> Option<&'a HistoryRecord> {
    grabbed
        .iter()
        .find(|row| row_tracking_id(row).as_ref() == Some(id))
}

/// History data map tying an outcome row back to its tracking key
pub(crate) fn outcome_data(item: &DownloadItem) -> HashMap<String, String> {
    let mut data = HashMap::new();
    data.insert(
        history_data::DOWNLOAD_CLIENT.to_string(),
        item.client_name.clone(),
    );
    data.insert(
        history_data::DOWNLOAD_CLIENT_ID.to_string(),
        item.download_client_id.clone(),
    );
    data
}
