//! The reconciliation pass
//!
//! One pass polls every enabled client, merges the reports into the
//! tracked snapshot, and runs the outcome detectors over the result.
//! Nothing in here returns an error: a backend that cannot be reached
//! contributes nothing this pass, and a history store that cannot be
//! read skips outcome detection until it recovers.

use crate::types::{
    DownloadItem, DownloadItemStatus, Event, HistoryRecord, TrackedDownload, TrackedState,
    TrackingId,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, trace};

use super::DownloadTracker;
use crate::config::TrackingConfig;

/// History context loaded once per pass and shared by both detectors
struct PassHistory {
    grabbed: Vec<HistoryRecord>,
    failed: Vec<HistoryRecord>,
    imported: Vec<HistoryRecord>,
}

impl DownloadTracker {
    /// One full reconciliation pass
    ///
    /// Callers serialize passes; [`process`](DownloadTracker::process)
    /// and the poll loop both hold the pass lock around this.
    pub(crate) async fn run_pass(&self) {
        let started = Instant::now();
        let previous = self.store.all().await;
        let reports = self.poll_clients().await;

        let (mut next, mut state_changed) = merge_reports(&previous, reports);
        self.store.replace_all(next.clone()).await;

        // Detector work needs the history context; when it cannot be
        // loaded the entries keep their current state and the next pass
        // tries again.
        match self.load_pass_history().await {
            Ok(history) => {
                state_changed |= self.detect_outcomes(&mut next, &history).await;
                self.store.replace_all(next.clone()).await;
            }
            Err(e) => {
                error!(error = %e, "could not load history; outcome detection skipped this pass");
            }
        }

        let queued = queued_view(&next, &self.config);
        self.store.set_queued(queued).await;

        if state_changed {
            self.emit(Event::QueueUpdated);
        }

        debug!(
            tracked = next.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reconciliation pass finished"
        );
    }

    /// Poll every enabled client in parallel, one timeout per call
    ///
    /// A client that errors or times out contributes nothing this pass;
    /// its previously tracked items will read as removed until it
    /// answers again.
    async fn poll_clients(&self) -> Vec<DownloadItem> {
        let timeout = self.config.poll_timeout;
        let polls = self.registry.enabled().map(|client| {
            let client = client.clone();
            async move {
                let name = &client.definition().name;
                match tokio::time::timeout(timeout, client.get_items()).await {
                    Ok(Ok(items)) => {
                        trace!(client = %name, items = items.len(), "client poll finished");
                        items
                    }
                    Ok(Err(e)) => {
                        error!(client = %name, error = %e, "client poll failed");
                        Vec::new()
                    }
                    Err(_) => {
                        error!(
                            client = %name,
                            timeout_secs = timeout.as_secs(),
                            "client poll timed out"
                        );
                        Vec::new()
                    }
                }
            }
        });

        join_all(polls).await.into_iter().flatten().collect()
    }

    async fn load_pass_history(&self) -> crate::Result<PassHistory> {
        Ok(PassHistory {
            grabbed: self.history.grabbed().await?,
            failed: self.history.failed().await?,
            imported: self.history.imported().await?,
        })
    }

    /// Promote fresh entries and run both detectors over the snapshot
    ///
    /// Returns whether any entry was mutated. Removed entries are never
    /// detector candidates; their last observed item is stale.
    async fn detect_outcomes(
        &self,
        entries: &mut [TrackedDownload],
        history: &PassHistory,
    ) -> bool {
        let mut changed = false;

        for tracked in entries.iter_mut() {
            if tracked.state == TrackedState::Unknown {
                tracked.state = TrackedState::Downloading;
                changed = true;
            }
            if tracked.state != TrackedState::Downloading {
                continue;
            }

            let Some(client) = self.registry.get(tracked.client_id) else {
                debug!(
                    id = %tracked.id,
                    client_id = %tracked.client_id,
                    "tracked download has no configured client; skipping outcome detection"
                );
                continue;
            };

            if self.config.enable_failed_download_handling {
                changed |= self
                    .failed_service
                    .check(client.as_ref(), tracked, &history.grabbed, &history.failed)
                    .await;
            }
            if self.config.enable_completed_download_handling {
                changed |= self
                    .completed_service
                    .check(client.as_ref(), tracked, &history.grabbed, &history.imported)
                    .await;
            }
        }

        changed
    }
}

/// Merge freshly polled items into the previous snapshot
///
/// Returns the next snapshot and whether tracked state changed. Known
/// keys carry their identity and outcome fields across the merge and
/// always take the newly reported item; unknown keys start tracking.
/// Keys no longer reported stay in the snapshot as `Removed` and never
/// leave it, so a removal stays observable even when the same key later
/// reappears.
pub(crate) fn merge_reports(
    previous: &[TrackedDownload],
    reports: Vec<DownloadItem>,
) -> (Vec<TrackedDownload>, bool) {
    let previous_by_id: HashMap<&TrackingId, &TrackedDownload> = previous
        .iter()
        .map(|tracked| (&tracked.id, tracked))
        .collect();

    let mut state_changed = false;
    let mut next: Vec<TrackedDownload> = Vec::with_capacity(previous.len());
    let mut index: HashMap<TrackingId, usize> = HashMap::new();

    for item in reports {
        let id = TrackingId::new(item.client_id, &item.download_client_id);

        if let Some(&slot) = index.get(&id) {
            // An item mid-handoff shows up in both the queue and the
            // history of one poll. The later report wins; adapters list
            // history last.
            next[slot].item = item;
            continue;
        }

        let tracked = match previous_by_id.get(&id) {
            Some(existing) => {
                let mut carried = (*existing).clone();
                carried.item = item;
                carried
            }
            None => {
                let tracked = TrackedDownload::new(item);
                trace!(id = %tracked.id, title = %tracked.item.title, "started tracking download");
                state_changed = true;
                tracked
            }
        };

        index.insert(id, next.len());
        next.push(tracked);
    }

    for existing in previous {
        if index.contains_key(&existing.id) {
            continue;
        }
        let mut carried = existing.clone();
        if carried.state != TrackedState::Removed {
            debug!(
                id = %carried.id,
                title = %carried.item.title,
                "download no longer reported by its client"
            );
            carried.state = TrackedState::Removed;
            state_changed = true;
        }
        next.push(carried);
    }

    (next, state_changed)
}

/// Filter policy for the queued view
///
/// Failed and Completed items stay visible while the matching outcome
/// handler is enabled, since those entries still have work pending.
pub(crate) fn queued_view(
    entries: &[TrackedDownload],
    config: &TrackingConfig,
) -> Vec<TrackedDownload> {
    entries
        .iter()
        .filter(|tracked| tracked.state == TrackedState::Downloading)
        .filter(|tracked| match tracked.item.status {
            DownloadItemStatus::Queued
            | DownloadItemStatus::Paused
            | DownloadItemStatus::Downloading => true,
            DownloadItemStatus::Failed => config.enable_failed_download_handling,
            DownloadItemStatus::Completed => config.enable_completed_download_handling,
        })
        .cloned()
        .collect()
}
