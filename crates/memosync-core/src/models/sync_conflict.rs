//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which copy of an entity survived a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The on-device cached copy
    Local,
    /// The remotely stored copy
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Conflict resolved by timestamp because local content diverged from its fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Item type of the conflicting entity (`memo`, `calendar`, ...)
    pub item_type: String,
    /// Entity id, date key, or document sentinel
    pub entity_id: String,
    /// Local copy's timestamp (unix ms)
    pub local_updated_at: i64,
    /// Remote copy's timestamp (unix ms)
    pub remote_updated_at: i64,
    /// Timestamp the remote copy was compared against (unix ms)
    pub synced_updated_at: i64,
    /// True when no fingerprint existed and the local timestamp stood in
    pub fingerprint_missing: bool,
    /// Copy that won
    pub winner: Side,
}
