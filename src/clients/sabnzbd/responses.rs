//! Response models for the SABnzbd JSON API
//!
//! SABnzbd reports queue sizes as decimal megabyte strings and remaining
//! time as `h:mm:ss`; the parsing helpers here turn those into bytes and
//! [`Duration`]s.

use serde::Deserialize;
use std::time::Duration;

/// Envelope around `mode=queue`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SabnzbdQueueResponse {
    /// The queue payload
    pub queue: SabnzbdQueue,
}

/// Current queue state
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SabnzbdQueue {
    /// Whether the whole queue is paused
    #[serde(default)]
    pub paused: bool,

    /// One slot per queued download
    #[serde(default)]
    pub slots: Vec<SabnzbdQueueSlot>,
}

/// One queue entry
#[derive(Clone, Debug, Deserialize)]
pub struct SabnzbdQueueSlot {
    /// Item id ("SABnzbd_nzo_...")
    pub nzo_id: String,

    /// Release name
    pub filename: String,

    /// Category ("*" when none)
    #[serde(default)]
    pub cat: String,

    /// Total size as a decimal megabyte string (e.g. "1000.00")
    #[serde(default)]
    pub mb: String,

    /// Remaining size as a decimal megabyte string
    #[serde(default)]
    pub mbleft: String,

    /// Remaining time as "h:mm:ss"
    #[serde(default)]
    pub timeleft: String,

    /// Slot status ("Queued", "Downloading", "Paused", ...)
    #[serde(default)]
    pub status: String,
}

/// Envelope around `mode=history`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SabnzbdHistoryResponse {
    /// The history payload
    pub history: SabnzbdHistory,
}

/// History state
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SabnzbdHistory {
    /// One slot per finished or finishing download
    #[serde(default)]
    pub slots: Vec<SabnzbdHistorySlot>,
}

/// One history entry
#[derive(Clone, Debug, Deserialize)]
pub struct SabnzbdHistorySlot {
    /// Item id ("SABnzbd_nzo_...")
    pub nzo_id: String,

    /// Release name
    pub name: String,

    /// Category ("*" when none)
    #[serde(default)]
    pub category: String,

    /// Size in bytes
    #[serde(default)]
    pub bytes: u64,

    /// Slot status ("Completed", "Failed", or a post-processing stage)
    #[serde(default)]
    pub status: String,

    /// Completed output directory (empty until the move finishes)
    #[serde(default)]
    pub storage: String,

    /// Failure reason (empty unless failed)
    #[serde(default)]
    pub fail_message: String,
}

/// Response to `mode=addurl`
#[derive(Clone, Debug, Deserialize)]
pub struct SabnzbdAddResponse {
    /// Whether the add was accepted
    #[serde(default)]
    pub status: bool,

    /// Ids assigned to the added NZB
    #[serde(default)]
    pub nzo_ids: Vec<String>,

    /// Error message when rejected
    #[serde(default)]
    pub error: Option<String>,
}

/// Generic `{"status": ..., "error": ...}` response (delete, retry, ...)
#[derive(Clone, Debug, Deserialize)]
pub struct SabnzbdResult {
    /// Whether the operation succeeded
    #[serde(default)]
    pub status: bool,

    /// Error message when it did not
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to `mode=version`
#[derive(Clone, Debug, Deserialize)]
pub struct SabnzbdVersionResponse {
    /// Version string (e.g. "3.7.2")
    pub version: String,
}

/// Parse a decimal megabyte string ("1000.00") into bytes
///
/// Unparseable values count as zero; SABnzbd occasionally reports
/// placeholder strings while fetching metadata.
pub(crate) fn parse_megabytes(mb: &str) -> u64 {
    mb.trim()
        .parse::<f64>()
        .map(|mb| (mb * 1024.0 * 1024.0) as u64)
        .unwrap_or(0)
}

/// Parse a "h:mm:ss" (or "d:hh:mm:ss") time-left string
///
/// Returns `None` for zero, empty, or unparseable values.
pub(crate) fn parse_timeleft(timeleft: &str) -> Option<Duration> {
    const UNIT_SECONDS: [u64; 4] = [1, 60, 3600, 86_400];

    let parts: Vec<&str> = timeleft.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }

    let mut seconds: u64 = 0;
    for (unit, part) in UNIT_SECONDS.iter().zip(parts.iter().rev()) {
        seconds = seconds.checked_add(unit.checked_mul(part.parse().ok()?)?)?;
    }

    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}
