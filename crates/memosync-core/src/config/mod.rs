//! Sync engine configuration.
//!
//! Every field has a default, so an absent or empty config file yields the
//! behaviour existing clients already rely on.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::SyncThresholds;

const DEFAULT_EQUIVALENCE_WINDOW_MS: u64 = 60_000;
const DEFAULT_CONFLICT_THRESHOLD_MS: u64 = 1_800_000;
const DEFAULT_CYCLE_COOLDOWN_MS: u64 = 5_000;
const DEFAULT_TOMBSTONE_RETENTION_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// How the macro list is merged when local differs from the last pushed list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroMergePolicy {
    /// Local wins whenever it differs from the last pushed list
    #[default]
    LocalWinsOnMismatch,
    /// Fingerprint-then-timestamp resolution, like every other entity
    Timestamp,
}

/// Tunables of the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncEngineConfig {
    /// Server and local sync times closer than this count as equal
    #[serde(default = "default_equivalence_window_ms")]
    pub equivalence_window_ms: u64,
    /// Local newer than the server by more than this needs user confirmation
    #[serde(default = "default_conflict_threshold_ms")]
    pub conflict_threshold_ms: u64,
    /// A cycle for a data type within this long of the previous one is skipped
    #[serde(default = "default_cycle_cooldown_ms")]
    pub cycle_cooldown_ms: u64,
    #[serde(default)]
    pub macro_policy: MacroMergePolicy,
    /// Tombstones of ids gone from both sides are pruned after this long
    #[serde(default = "default_tombstone_retention_ms")]
    pub tombstone_retention_ms: u64,
}

const fn default_equivalence_window_ms() -> u64 {
    DEFAULT_EQUIVALENCE_WINDOW_MS
}

const fn default_conflict_threshold_ms() -> u64 {
    DEFAULT_CONFLICT_THRESHOLD_MS
}

const fn default_cycle_cooldown_ms() -> u64 {
    DEFAULT_CYCLE_COOLDOWN_MS
}

const fn default_tombstone_retention_ms() -> u64 {
    DEFAULT_TOMBSTONE_RETENTION_MS
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            equivalence_window_ms: DEFAULT_EQUIVALENCE_WINDOW_MS,
            conflict_threshold_ms: DEFAULT_CONFLICT_THRESHOLD_MS,
            cycle_cooldown_ms: DEFAULT_CYCLE_COOLDOWN_MS,
            macro_policy: MacroMergePolicy::default(),
            tombstone_retention_ms: DEFAULT_TOMBSTONE_RETENTION_MS,
        }
    }
}

impl SyncEngineConfig {
    pub const fn thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            equivalence_window_ms: self.equivalence_window_ms,
            conflict_threshold_ms: self.conflict_threshold_ms,
        }
    }

    pub const fn cycle_cooldown(&self) -> Duration {
        Duration::from_millis(self.cycle_cooldown_ms)
    }

    /// Deletion time at or before which a tombstone may be pruned
    pub fn tombstone_cutoff(&self, now_ms: i64) -> i64 {
        let retention = i64::try_from(self.tombstone_retention_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(retention)
    }

    pub fn validate(&self) -> Result<()> {
        if self.equivalence_window_ms > self.conflict_threshold_ms {
            return Err(Error::Config(format!(
                "equivalence_window_ms ({}) must not exceed conflict_threshold_ms ({})",
                self.equivalence_window_ms, self.conflict_threshold_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config payload
    pub fn parse(raw: &str) -> Result<Self> {
        let config = serde_json::from_str::<Self>(raw)
            .map_err(|error| Error::Config(format!("Failed to parse config: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file gives the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        Self::parse(&raw).map_err(|error| match error {
            Error::Config(message) => Error::Config(format!("{message} ({})", path.display())),
            other => other,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}
