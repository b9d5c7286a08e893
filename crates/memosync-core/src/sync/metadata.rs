//! Coarse per-data-type sync metadata.
//!
//! Independent of the per-entity fingerprints: one timestamp per
//! `(user, data type)` recording when this device last synced it, used to
//! decide at login or foreground whether server or device data is fresher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::DataType;
use crate::store::KeyValueStore;

/// Key prefix of sync timestamps: `syncTimestamp_<userId>_<dataType>`
pub const SYNC_TIMESTAMP_KEY_PREFIX: &str = "syncTimestamp_";

/// Which side's data to trust for a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Server,
    Local,
    /// Local is much newer than the server; the user should confirm
    Conflict,
    Unknown,
}

/// Windows used by [`SyncThresholds::compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncThresholds {
    pub equivalence_window_ms: u64,
    pub conflict_threshold_ms: u64,
}

impl Default for SyncThresholds {
    fn default() -> Self {
        Self {
            equivalence_window_ms: 60_000,
            conflict_threshold_ms: 1_800_000,
        }
    }
}

impl SyncThresholds {
    /// Compare the server's last update with this device's last sync.
    pub const fn compare(&self, server: Option<i64>, local: Option<i64>) -> SyncAction {
        let (server, local) = match (server, local) {
            (None, None) => return SyncAction::Unknown,
            (None, Some(_)) => return SyncAction::Local,
            (Some(_), None) => return SyncAction::Server,
            (Some(server), Some(local)) => (server, local),
        };

        let diff = server.abs_diff(local);
        if diff < self.equivalence_window_ms || server > local {
            SyncAction::Server
        } else if diff > self.conflict_threshold_ms {
            SyncAction::Conflict
        } else {
            SyncAction::Local
        }
    }
}

/// [`SyncThresholds::compare`] with the default thresholds
pub fn compare_timestamps(server: Option<i64>, local: Option<i64>) -> SyncAction {
    SyncThresholds::default().compare(server, local)
}

/// Decision for one data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub action: SyncAction,
    pub server_timestamp: Option<i64>,
    pub local_timestamp: Option<i64>,
}

/// Decisions for every data type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStrategy {
    pub entries: BTreeMap<DataType, StrategyEntry>,
}

/// Data type where local is far ahead of the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampConflict {
    pub data_type: DataType,
    pub server_timestamp: Option<i64>,
    pub local_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub conflicts: Vec<TimestampConflict>,
    pub server_newer: Vec<DataType>,
    pub local_newer: Vec<DataType>,
    pub needs_user_confirmation: bool,
}

impl ConflictSummary {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

impl SyncStrategy {
    pub fn action(&self, data_type: DataType) -> Option<SyncAction> {
        self.entries.get(&data_type).map(|entry| entry.action)
    }

    /// Group the decisions for presentation
    pub fn summary(&self) -> ConflictSummary {
        let mut summary = ConflictSummary::default();
        for (&data_type, entry) in &self.entries {
            match entry.action {
                SyncAction::Conflict => summary.conflicts.push(TimestampConflict {
                    data_type,
                    server_timestamp: entry.server_timestamp,
                    local_timestamp: entry.local_timestamp,
                }),
                SyncAction::Server => summary.server_newer.push(data_type),
                SyncAction::Local => summary.local_newer.push(data_type),
                SyncAction::Unknown => {}
            }
        }
        summary.needs_user_confirmation =
            !summary.conflicts.is_empty() || !summary.local_newer.is_empty();
        summary
    }
}

/// Sync timestamps of one user on this device
pub struct SyncMetadataTracker<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    user_id: &'a str,
    thresholds: SyncThresholds,
}

impl<'a, S: KeyValueStore + ?Sized> SyncMetadataTracker<'a, S> {
    pub const fn new(store: &'a S, user_id: &'a str, thresholds: SyncThresholds) -> Self {
        Self {
            store,
            user_id,
            thresholds,
        }
    }

    pub fn key(user_id: &str, data_type: DataType) -> String {
        format!("{SYNC_TIMESTAMP_KEY_PREFIX}{user_id}_{data_type}")
    }

    /// Last sync of `data_type`; absent or unparsable values read as `None`
    pub fn local_timestamp(&self, data_type: DataType) -> Result<Option<i64>> {
        let key = Self::key(self.user_id, data_type);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let parsed = raw.trim().parse::<i64>().ok();
        if parsed.is_none() {
            tracing::warn!("Ignoring unreadable sync timestamp at {key}");
        }
        Ok(parsed)
    }

    pub fn set_local_timestamp(&self, data_type: DataType, timestamp_ms: i64) -> Result<()> {
        self.store.set(
            &Self::key(self.user_id, data_type),
            &timestamp_ms.to_string(),
        )
    }

    pub fn all_local_timestamps(&self) -> Result<BTreeMap<DataType, Option<i64>>> {
        DataType::ALL
            .into_iter()
            .map(|data_type| Ok((data_type, self.local_timestamp(data_type)?)))
            .collect()
    }

    pub fn update_all(&self, timestamp_ms: i64) -> Result<()> {
        for data_type in DataType::ALL {
            self.set_local_timestamp(data_type, timestamp_ms)?;
        }
        Ok(())
    }

    /// Decide every data type against the server's last-update times.
    ///
    /// Data types missing from `server_timestamps` count as absent on the server.
    pub fn decide_strategy(
        &self,
        server_timestamps: &BTreeMap<DataType, i64>,
    ) -> Result<SyncStrategy> {
        let mut strategy = SyncStrategy::default();
        for (data_type, local_timestamp) in self.all_local_timestamps()? {
            let server_timestamp = server_timestamps.get(&data_type).copied();
            strategy.entries.insert(
                data_type,
                StrategyEntry {
                    action: self.thresholds.compare(server_timestamp, local_timestamp),
                    server_timestamp,
                    local_timestamp,
                },
            );
        }
        Ok(strategy)
    }

    /// True when no data type has ever been synced on this device
    pub fn is_first_login(&self) -> Result<bool> {
        Ok(self
            .all_local_timestamps()?
            .values()
            .all(Option::is_none))
    }

    /// Remove every sync timestamp of the user, as on logout
    pub fn clear(&self) -> Result<()> {
        for data_type in DataType::ALL {
            self.store.remove(&Self::key(self.user_id, data_type))?;
        }
        tracing::info!(user_id = self.user_id, "Cleared sync metadata");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn compare_handles_missing_sides() {
        assert_eq!(compare_timestamps(None, None), SyncAction::Unknown);
        assert_eq!(compare_timestamps(None, Some(NOW)), SyncAction::Local);
        assert_eq!(compare_timestamps(Some(NOW), None), SyncAction::Server);
    }

    #[test]
    fn compare_equivalence_window_boundary() {
        assert_eq!(
            compare_timestamps(Some(NOW), Some(NOW + 59_999)),
            SyncAction::Server
        );
        assert_eq!(
            compare_timestamps(Some(NOW), Some(NOW + 60_000)),
            SyncAction::Local
        );
        assert_eq!(
            compare_timestamps(Some(NOW + 60_000), Some(NOW)),
            SyncAction::Server
        );
    }

    #[test]
    fn compare_conflict_threshold_boundary() {
        assert_eq!(
            compare_timestamps(Some(NOW), Some(NOW + 1_800_000)),
            SyncAction::Local
        );
        assert_eq!(
            compare_timestamps(Some(NOW), Some(NOW + 1_800_001)),
            SyncAction::Conflict
        );
    }

    #[test]
    fn compare_uses_configured_thresholds() {
        let thresholds = SyncThresholds {
            equivalence_window_ms: 10,
            conflict_threshold_ms: 100,
        };
        assert_eq!(thresholds.compare(Some(0), Some(50)), SyncAction::Local);
        assert_eq!(thresholds.compare(Some(0), Some(101)), SyncAction::Conflict);
    }

    #[test]
    fn timestamps_round_trip_and_first_login() {
        let store = MemoryStore::new();
        let tracker = SyncMetadataTracker::new(&store, "u1", SyncThresholds::default());

        assert!(tracker.is_first_login().unwrap());
        tracker.set_local_timestamp(DataType::Memos, NOW).unwrap();
        assert_eq!(tracker.local_timestamp(DataType::Memos).unwrap(), Some(NOW));
        assert_eq!(store.get("syncTimestamp_u1_memos").unwrap().as_deref(), Some("1700000000000"));
        assert!(!tracker.is_first_login().unwrap());

        store.set("syncTimestamp_u1_trash", "garbage").unwrap();
        assert_eq!(tracker.local_timestamp(DataType::Trash).unwrap(), None);
    }

    #[test]
    fn update_all_then_clear() {
        let store = MemoryStore::new();
        let tracker = SyncMetadataTracker::new(&store, "u1", SyncThresholds::default());
        let other = SyncMetadataTracker::new(&store, "u2", SyncThresholds::default());
        other.set_local_timestamp(DataType::Memos, 1).unwrap();

        tracker.update_all(NOW).unwrap();
        let all = tracker.all_local_timestamps().unwrap();
        assert_eq!(all.len(), DataType::ALL.len());
        assert!(all.values().all(|timestamp| *timestamp == Some(NOW)));

        tracker.clear().unwrap();
        assert!(tracker.is_first_login().unwrap());
        assert_eq!(other.local_timestamp(DataType::Memos).unwrap(), Some(1));
    }

    #[test]
    fn strategy_summary_flags_confirmation() {
        let store = MemoryStore::new();
        let tracker = SyncMetadataTracker::new(&store, "u1", SyncThresholds::default());
        tracker.set_local_timestamp(DataType::Memos, NOW + 3_600_000).unwrap();
        tracker.set_local_timestamp(DataType::Folders, NOW + 120_000).unwrap();
        tracker.set_local_timestamp(DataType::Calendar, NOW).unwrap();

        let server = BTreeMap::from([
            (DataType::Memos, NOW),
            (DataType::Folders, NOW),
            (DataType::Calendar, NOW + 10_000),
            (DataType::Settings, NOW),
        ]);
        let strategy = tracker.decide_strategy(&server).unwrap();
        assert_eq!(strategy.action(DataType::Trash), Some(SyncAction::Unknown));

        let summary = strategy.summary();
        assert_eq!(
            summary.conflicts,
            vec![TimestampConflict {
                data_type: DataType::Memos,
                server_timestamp: Some(NOW),
                local_timestamp: Some(NOW + 3_600_000),
            }]
        );
        assert_eq!(summary.local_newer, vec![DataType::Folders]);
        assert_eq!(
            summary.server_newer,
            vec![DataType::Calendar, DataType::Settings]
        );
        assert!(summary.needs_user_confirmation);
        assert!(summary.has_conflicts());
    }

    #[test]
    fn server_only_strategy_needs_no_confirmation() {
        let store = MemoryStore::new();
        let tracker = SyncMetadataTracker::new(&store, "u1", SyncThresholds::default());
        let server = BTreeMap::from([(DataType::Memos, NOW)]);

        let summary = tracker.decide_strategy(&server).unwrap().summary();
        assert_eq!(summary.server_newer, vec![DataType::Memos]);
        assert!(!summary.needs_user_confirmation);
    }
}
