//! Snapshot storage for tracked downloads
//!
//! One writer (the reconciliation pass) swaps snapshots in wholesale;
//! readers clone an `Arc` and never observe a half-updated set. The
//! queued view is a filtered projection of the tracked snapshot, cached
//! briefly so API consumers polling it cannot force a recompute per
//! request.

use crate::types::TrackedDownload;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Cached queued view plus the time it was computed
struct QueuedSnapshot {
    entries: Arc<Vec<TrackedDownload>>,
    refreshed_at: Option<Instant>,
}

/// Shared state behind the tracker's read API
pub(crate) struct TrackedDownloadStore {
    /// Latest reconciled snapshot, one entry per tracking id
    tracked: RwLock<Arc<Vec<TrackedDownload>>>,
    /// Filtered queued view derived from `tracked`
    queued: RwLock<QueuedSnapshot>,
}

impl TrackedDownloadStore {
    pub(crate) fn new() -> Self {
        Self {
            tracked: RwLock::new(Arc::new(Vec::new())),
            queued: RwLock::new(QueuedSnapshot {
                entries: Arc::new(Vec::new()),
                refreshed_at: None,
            }),
        }
    }

    /// Current tracked snapshot
    pub(crate) async fn all(&self) -> Arc<Vec<TrackedDownload>> {
        self.tracked.read().await.clone()
    }

    /// Replace the tracked snapshot
    ///
    /// Keys must be unique; the reconciliation merge guarantees this.
    pub(crate) async fn replace_all(&self, entries: Vec<TrackedDownload>) {
        debug_assert!(
            {
                let mut keys = HashSet::new();
                entries.iter().all(|entry| keys.insert(&entry.id))
            },
            "duplicate tracking id in replaced snapshot"
        );
        *self.tracked.write().await = Arc::new(entries);
    }

    /// Queued view, recomputed from the tracked snapshot when the cache
    /// is older than `ttl`
    ///
    /// `compute` filters the tracked snapshot; it must not poll clients.
    pub(crate) async fn queued_with<F>(
        &self,
        ttl: Duration,
        compute: F,
    ) -> Arc<Vec<TrackedDownload>>
    where
        F: FnOnce(&[TrackedDownload]) -> Vec<TrackedDownload>,
    {
        {
            let cached = self.queued.read().await;
            if let Some(at) = cached.refreshed_at {
                if at.elapsed() < ttl {
                    return cached.entries.clone();
                }
            }
        }

        let tracked = self.all().await;
        let mut cached = self.queued.write().await;
        // Another reader may have refreshed while we waited for the lock
        if let Some(at) = cached.refreshed_at {
            if at.elapsed() < ttl {
                return cached.entries.clone();
            }
        }
        cached.entries = Arc::new(compute(&tracked));
        cached.refreshed_at = Some(Instant::now());
        cached.entries.clone()
    }

    /// Install a freshly computed queued view (end of a reconciliation pass)
    pub(crate) async fn set_queued(&self, entries: Vec<TrackedDownload>) {
        let mut cached = self.queued.write().await;
        cached.entries = Arc::new(entries);
        cached.refreshed_at = Some(Instant::now());
    }
}
