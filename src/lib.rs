//! # grabtrack
//!
//! Download-client tracking and reconciliation engine.
//!
//! grabtrack hands releases to download clients (SABnzbd, NzbGet), then
//! reconciles what the clients report back into a consistent set of tracked
//! downloads: it detects failures and completions, records every outcome in
//! history exactly once, and broadcasts change events.
//!
//! ## Design Philosophy
//!
//! - **Clients own the queue** - grabtrack never caches progress; every pass
//!   re-polls the backends and mirrors what they report
//! - **Outcomes are recorded once** - history rows make failure and import
//!   handling idempotent across restarts
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding,
//!   with an optional REST API for observation
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use grabtrack::{ClientConfig, ClientKind, Config, GrabPriority, Grabtrack};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         clients: vec![ClientConfig {
//!             id: 1,
//!             name: "sabnzbd".to_string(),
//!             kind: ClientKind::Sabnzbd,
//!             enable: true,
//!             host: "localhost".to_string(),
//!             port: 8080,
//!             use_tls: false,
//!             url_base: None,
//!             api_key: Some("api-key".to_string()),
//!             username: None,
//!             password: None,
//!             category: Some("tv".to_string()),
//!             recent_priority: GrabPriority::High,
//!             older_priority: GrabPriority::Normal,
//!             recent_age_days: 14,
//!         }],
//!         ..Default::default()
//!     };
//!
//!     let app = Grabtrack::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = app.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Reconcile once, then keep reconciling on the configured interval
//!     app.start().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Download client adapters and registry
pub mod clients;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Import handling for completed downloads
pub mod import;
/// Release matching for reported titles
pub mod matcher;
/// Reconciliation core
pub mod tracking;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use clients::{ClientDefinition, DownloadClient, registry::ClientRegistry};
pub use config::{ClientConfig, ClientKind, Config, GrabPriority, TrackingConfig};
pub use db::{Database, HistoryStore, NewHistoryRow};
pub use error::{
    ApiError, DatabaseError, DownloadClientError, Error, ErrorDetail, ImportError, Result,
    ToHttpStatus,
};
pub use import::{CommandImportHandler, ImportHandler, NoOpImportHandler};
pub use matcher::{AcceptAllMatcher, ListMatcher, ReleaseMatcher};
pub use tracking::DownloadTracker;
pub use types::{
    ClientId, ClientTestResult, DownloadItem, DownloadItemStatus, DownloadProtocol, Event,
    HistoryEventType, HistoryRecord, RemoteRelease, TrackedDownload, TrackedState, TrackingId,
    TrackingStats,
};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The assembled tracking stack: clients, history database, tracker
///
/// Wires every component from a [`Config`] and owns their lifecycle. The
/// tracker itself stays reachable through [`tracker`](Self::tracker) for
/// grabs, triggers, and reads.
pub struct Grabtrack {
    tracker: Arc<DownloadTracker>,
    db: Arc<Database>,
    config: Arc<Config>,
    cancel_token: CancellationToken,
}

impl Grabtrack {
    /// Build the stack from configuration
    ///
    /// Constructs the client adapters, opens (and migrates) the history
    /// database, and assembles the tracker. Nothing is polled until
    /// [`start`](Self::start) runs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid client definition and
    /// a database error when the history database cannot be opened.
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let matcher: Arc<dyn ReleaseMatcher> = Arc::new(AcceptAllMatcher);
        let registry = Arc::new(ClientRegistry::from_config(&config, matcher)?);
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let import_handler = import::from_config(&config.import)?;

        let tracker = Arc::new(DownloadTracker::new(
            registry,
            db.clone(),
            import_handler,
            config.tracking.clone(),
        ));

        Ok(Self {
            tracker,
            db,
            config,
            cancel_token: CancellationToken::new(),
        })
    }

    /// The tracker behind this stack
    pub fn tracker(&self) -> &Arc<DownloadTracker> {
        &self.tracker
    }

    /// The history database behind this stack
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Subscribe to tracker events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.tracker.subscribe()
    }

    /// Hand a release to a download client and track it
    ///
    /// # Errors
    ///
    /// See [`DownloadTracker::grab`].
    pub async fn grab(&self, release: &RemoteRelease) -> Result<TrackingId> {
        self.tracker.grab(release).await
    }

    /// Reconcile once, then keep reconciling on the configured interval
    ///
    /// Returns the poll loop's task handle; the loop stops when
    /// [`shutdown`](Self::shutdown) runs.
    pub async fn start(&self) -> JoinHandle<()> {
        self.tracker.handle_application_started().await;
        self.tracker.spawn_poll_loop(self.cancel_token.child_token())
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with reconciliation and listens on the
    /// configured bind address (default: 127.0.0.1:6791).
    pub fn spawn_api_server(&self) -> JoinHandle<Result<()>> {
        let tracker = self.tracker.clone();
        let db = self.db.clone();
        let config = self.config.clone();

        tokio::spawn(async move { api::start_api_server(tracker, db, config).await })
    }

    /// Gracefully shut down the stack
    ///
    /// Stops the poll loop and announces the shutdown. In-memory tracking
    /// state is rebuilt from the clients on the next start; history is
    /// already durable, so nothing needs persisting here.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");

        self.cancel_token.cancel();
        self.tracker.emit(Event::Shutdown);

        tracing::info!("shutdown complete");
        Ok(())
    }
}

/// Helper function to run the tracker stack with graceful signal handling.
///
/// Waits for a termination signal and then calls [`Grabtrack::shutdown`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use grabtrack::{Config, Grabtrack, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let app = Grabtrack::new(Config::default()).await?;
///     app.start().await;
///     app.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(app).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(app: Grabtrack) -> Result<()> {
    wait_for_signal().await;
    app.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
