//! Application state for the API server

use crate::db::Database;
use crate::{Config, DownloadTracker};
use std::sync::Arc;

/// Shared state handed to every route handler
///
/// Cloned per request; all fields are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    /// The reconciliation engine behind every queue view and trigger
    pub tracker: Arc<DownloadTracker>,

    /// History database backing the paginated history endpoint
    pub db: Arc<Database>,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(tracker: Arc<DownloadTracker>, db: Arc<Database>, config: Arc<Config>) -> Self {
        Self {
            tracker,
            db,
            config,
        }
    }
}
