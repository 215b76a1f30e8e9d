//! Failure detection and handling
//!
//! Watches for tracked downloads their client reports as failed, records
//! the failure exactly once per tracking key, and then retries or removes
//! the item on the backend per configuration.

use crate::clients::DownloadClient;
use crate::config::TrackingConfig;
use crate::db::{HistoryStore, NewHistoryRow};
use crate::types::{DownloadItemStatus, Event, HistoryEventType, HistoryRecord, TrackedDownload};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{grabbed_row_for, history_contains, outcome_data};

/// Classifies tracked downloads against the failed history and records
/// new failures
pub(crate) struct FailedDownloadService {
    history: Arc<dyn HistoryStore>,
    config: TrackingConfig,
    event_tx: broadcast::Sender<Event>,
}

impl FailedDownloadService {
    pub(crate) fn new(
        history: Arc<dyn HistoryStore>,
        config: TrackingConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            history,
            config,
            event_tx,
        }
    }

    /// Check one tracked download for a failure outcome
    ///
    /// Returns whether the entry was mutated. The failure is recorded at
    /// most once per tracking key: the `failure_recorded` flag and the
    /// failed-history rows both guard against repeats, so the check can
    /// run every pass for the entry's lifetime.
    pub(crate) async fn check(
        &self,
        client: &dyn DownloadClient,
        tracked: &mut TrackedDownload,
        grabbed_history: &[HistoryRecord],
        failed_history: &[HistoryRecord],
    ) -> bool {
        if tracked.failure_recorded {
            return false;
        }

        if history_contains(failed_history, &tracked.id) {
            // Recorded by an earlier run; converge the in-memory flag
            tracked.failure_recorded = true;
            return true;
        }

        if tracked.item.status != DownloadItemStatus::Failed {
            return false;
        }

        let Some(grab) = grabbed_row_for(grabbed_history, &tracked.id) else {
            debug!(
                id = %tracked.id,
                title = %tracked.item.title,
                "failed download was not grabbed by this tracker; ignoring"
            );
            return false;
        };

        let row = NewHistoryRow {
            event: HistoryEventType::Failed,
            source_title: grab.source_title.clone(),
            category: grab.category.clone(),
            client_id: Some(tracked.client_id),
            data: outcome_data(&tracked.item),
        };
        if let Err(e) = self.history.record(&row).await {
            error!(
                id = %tracked.id,
                title = %grab.source_title,
                error = %e,
                "could not record download failure; will retry next pass"
            );
            return false;
        }

        tracked.failure_recorded = true;
        info!(id = %tracked.id, title = %grab.source_title, "download failed");
        self.event_tx
            .send(Event::DownloadFailed {
                id: tracked.id.clone(),
                title: grab.source_title.clone(),
                message: tracked.item.message.clone(),
            })
            .ok();

        self.handle_failed_item(client, tracked).await;

        true
    }

    /// Retry or remove the failed item on its backend
    ///
    /// Best effort: the failure stays recorded even when the backend
    /// refuses the follow-up action.
    async fn handle_failed_item(&self, client: &dyn DownloadClient, tracked: &TrackedDownload) {
        let item_id = &tracked.item.download_client_id;

        if self.config.retry_failed_downloads {
            match client.retry_download(item_id).await {
                Ok(_) => info!(id = %tracked.id, "failed download sent back for retry"),
                Err(e) => {
                    warn!(id = %tracked.id, error = %e, "could not retry failed download")
                }
            }
        } else if self.config.remove_failed_downloads {
            match client.remove_item(item_id).await {
                Ok(()) => info!(id = %tracked.id, "removed failed download from client"),
                Err(e) => {
                    warn!(id = %tracked.id, error = %e, "could not remove failed download")
                }
            }
        }
    }
}
