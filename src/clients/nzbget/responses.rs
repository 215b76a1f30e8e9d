//! Response models for the NzbGet JSON-RPC API
//!
//! NzbGet splits 64-bit sizes into `*Hi`/`*Lo` u32 halves because JSON
//! numbers are doubles on the wire; [`make_i64`] rejoins them.

use serde::{Deserialize, Serialize};

/// JSON-RPC response envelope
#[derive(Clone, Debug, Deserialize)]
pub struct NzbgetRpcResponse<T> {
    /// Call result, absent on error
    #[serde(default)]
    pub result: Option<T>,

    /// RPC error, absent on success
    #[serde(default)]
    pub error: Option<NzbgetRpcError>,
}

/// JSON-RPC error payload
#[derive(Clone, Debug, Deserialize)]
pub struct NzbgetRpcError {
    /// Error name (e.g. "AUTHORIZATION_ERROR")
    pub name: String,

    /// Numeric error code
    #[serde(default)]
    pub code: i64,
}

/// One `listgroups` entry
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NzbgetQueueItem {
    /// Queue entry id
    #[serde(rename = "NZBID")]
    pub nzb_id: i64,

    /// Release name
    #[serde(rename = "NZBName")]
    pub nzb_name: String,

    /// Category ("" when none)
    #[serde(default)]
    pub category: String,

    /// Total size, low half
    #[serde(default)]
    pub file_size_lo: u32,
    /// Total size, high half
    #[serde(default)]
    pub file_size_hi: u32,

    /// Remaining size, low half
    #[serde(default)]
    pub remaining_size_lo: u32,
    /// Remaining size, high half
    #[serde(default)]
    pub remaining_size_hi: u32,

    /// Paused size, low half
    #[serde(default)]
    pub paused_size_lo: u32,
    /// Paused size, high half
    #[serde(default)]
    pub paused_size_hi: u32,

    /// Number of active article downloads for this group
    #[serde(default)]
    pub active_downloads: u32,

    /// Post-processing parameters attached to the entry
    #[serde(default)]
    pub parameters: Vec<NzbgetParameter>,
}

/// One `history` entry
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NzbgetHistoryItem {
    /// History entry id
    #[serde(rename = "NZBID")]
    pub nzb_id: i64,

    /// Release name
    pub name: String,

    /// Category ("" when none)
    #[serde(default)]
    pub category: String,

    /// Total size, low half
    #[serde(default)]
    pub file_size_lo: u32,
    /// Total size, high half
    #[serde(default)]
    pub file_size_hi: u32,

    /// Par repair outcome ("NONE", "SUCCESS", "FAILURE", ...)
    #[serde(default = "none_status")]
    pub par_status: String,

    /// Unpack outcome
    #[serde(default = "none_status")]
    pub unpack_status: String,

    /// Move-to-destination outcome
    #[serde(default = "none_status")]
    pub move_status: String,

    /// Post-processing script outcome
    #[serde(default = "none_status")]
    pub script_status: String,

    /// Deletion reason ("NONE" unless deleted by health/dupe checks)
    #[serde(default = "none_status")]
    pub delete_status: String,

    /// Manual mark ("NONE", "GOOD", "BAD")
    #[serde(default = "none_status")]
    pub mark_status: String,

    /// Final output directory
    #[serde(default)]
    pub dest_dir: String,

    /// Post-processing parameters attached to the entry
    #[serde(default)]
    pub parameters: Vec<NzbgetParameter>,
}

/// A post-processing parameter (name/value pair)
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NzbgetParameter {
    /// Parameter name
    pub name: String,

    /// Parameter value
    pub value: String,
}

// Absent status fields mean the stage never ran
fn none_status() -> String {
    "NONE".to_string()
}

/// Rejoin a 64-bit size split into u32 halves
pub(crate) fn make_i64(hi: u32, lo: u32) -> i64 {
    ((hi as i64) << 32) | (lo as i64)
}
