//! Shared cross-platform state types.

use serde::Serialize;

use crate::sync::CycleReport;

/// Unified sync state used by every client surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    /// State a client should display after a reconciliation attempt.
    pub fn after_cycle(result: &crate::Result<CycleReport>) -> Self {
        match result {
            Ok(report) if report.skipped => Self::Idle,
            Ok(_) => Self::Synced,
            Err(crate::Error::Remote(_)) => Self::Offline,
            Err(crate::Error::CycleInProgress(_)) => Self::Syncing,
            Err(_) => Self::Error,
        }
    }
}
