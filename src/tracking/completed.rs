//! Completion detection and import hand-off
//!
//! Watches for tracked downloads their client reports as completed and
//! runs the import pipeline for them exactly once per tracking key. An
//! import that fails leaves the entry unmarked so the next pass retries.

use crate::clients::DownloadClient;
use crate::db::{HistoryStore, NewHistoryRow};
use crate::import::ImportHandler;
use crate::types::{DownloadItemStatus, Event, HistoryEventType, HistoryRecord, TrackedDownload};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{grabbed_row_for, history_contains, outcome_data};

/// Classifies tracked downloads against the imported history and hands
/// fresh completions to the import pipeline
pub(crate) struct CompletedDownloadService {
    history: Arc<dyn HistoryStore>,
    import_handler: Arc<dyn ImportHandler>,
    event_tx: broadcast::Sender<Event>,
}

impl CompletedDownloadService {
    pub(crate) fn new(
        history: Arc<dyn HistoryStore>,
        import_handler: Arc<dyn ImportHandler>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            history,
            import_handler,
            event_tx,
        }
    }

    /// Check one tracked download for a completion outcome
    ///
    /// Returns whether the entry was mutated. The import runs at most
    /// once per tracking key, guarded by the `import_recorded` flag and
    /// the imported-history rows.
    pub(crate) async fn check(
        &self,
        client: &dyn DownloadClient,
        tracked: &mut TrackedDownload,
        grabbed_history: &[HistoryRecord],
        imported_history: &[HistoryRecord],
    ) -> bool {
        if tracked.item.status != DownloadItemStatus::Completed {
            return false;
        }

        if tracked.import_recorded {
            return false;
        }

        if history_contains(imported_history, &tracked.id) {
            // Imported by an earlier run; converge the in-memory flag
            tracked.import_recorded = true;
            return true;
        }

        let Some(grab) = grabbed_row_for(grabbed_history, &tracked.id) else {
            debug!(
                id = %tracked.id,
                title = %tracked.item.title,
                "completed download was not grabbed by this tracker; ignoring"
            );
            return false;
        };

        let Some(output_path) = tracked.item.output_path.clone() else {
            warn!(
                id = %tracked.id,
                title = %tracked.item.title,
                "completed download reports no output path; will retry next pass"
            );
            return false;
        };

        if let Err(e) = self.import_handler.import(tracked).await {
            warn!(
                id = %tracked.id,
                title = %tracked.item.title,
                handler = self.import_handler.name(),
                error = %e,
                "import failed; will retry next pass"
            );
            return false;
        }

        let row = NewHistoryRow {
            event: HistoryEventType::Imported,
            source_title: grab.source_title.clone(),
            category: grab.category.clone(),
            client_id: Some(tracked.client_id),
            data: outcome_data(&tracked.item),
        };
        if let Err(e) = self.history.record(&row).await {
            // The import side effect already happened; keep the flag so
            // this process does not import twice. A restart may import
            // again since the history row is missing.
            error!(
                id = %tracked.id,
                title = %grab.source_title,
                error = %e,
                "import succeeded but could not be recorded"
            );
        }

        tracked.import_recorded = true;
        info!(
            id = %tracked.id,
            title = %grab.source_title,
            client = %client.definition().name,
            path = %output_path.display(),
            "imported completed download"
        );
        self.event_tx
            .send(Event::DownloadImported {
                id: tracked.id.clone(),
                title: grab.source_title.clone(),
                path: output_path,
            })
            .ok();

        true
    }
}
