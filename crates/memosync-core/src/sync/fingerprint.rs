//! Last-synced fingerprints.
//!
//! A fingerprint records what this device last wrote successfully to the
//! remote store for `(itemType, entityId)`. It separates "untouched since the
//! last sync" from "edited locally" without trusting clocks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::canonical::ContentDigest;
use super::timestamp::{list_timestamp, timestamp_of, value_timestamp};
use crate::error::Result;
use crate::models::Entity;
use crate::store::KeyValueStore;

/// Key prefix of fingerprints: `firestore_saved_<itemType>_<entityId>`
pub const FINGERPRINT_KEY_PREFIX: &str = "firestore_saved_";

/// Marker older clients store after deleting a calendar day upstream
const LEGACY_DELETED_MARKER: &str = "DELETED";

/// State of an entity as of this device's last successful remote write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Fingerprint {
    /// Content this device last wrote, with the entity's timestamp at that moment
    Written {
        digest: ContentDigest,
        updated_at: i64,
    },
    /// This device deleted the entity upstream
    Deleted { deleted_at: i64 },
}

impl Fingerprint {
    pub fn of_entity(entity: &Entity) -> Self {
        Self::Written {
            digest: ContentDigest::of_entity(entity),
            updated_at: timestamp_of(Some(entity)),
        }
    }

    pub fn of_values(values: &[Value]) -> Self {
        Self::Written {
            digest: ContentDigest::of_values(values),
            updated_at: list_timestamp(values),
        }
    }

    /// Whether `digest` is exactly what was last written
    pub fn matches(&self, digest: &ContentDigest) -> bool {
        match self {
            Self::Written { digest: written, .. } => written == digest,
            Self::Deleted { .. } => false,
        }
    }

    /// Timestamp the remote copy is compared against on conflict
    pub const fn synced_at(&self) -> i64 {
        match self {
            Self::Written { updated_at, .. } => *updated_at,
            Self::Deleted { deleted_at } => *deleted_at,
        }
    }

    pub const fn is_tombstone(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    /// Decode a stored fingerprint.
    ///
    /// Besides the current record format this accepts the `DELETED` marker
    /// and raw entity JSON, which is how earlier clients stored the last
    /// written payload.
    fn decode(raw: &str) -> Option<Self> {
        if raw == LEGACY_DELETED_MARKER {
            return Some(Self::Deleted { deleted_at: 0 });
        }
        if let Ok(fingerprint) = serde_json::from_str::<Self>(raw) {
            return Some(fingerprint);
        }
        let legacy = serde_json::from_str::<Value>(raw).ok()?;
        Some(Self::Written {
            digest: ContentDigest::of_value(&legacy),
            updated_at: value_timestamp(&legacy),
        })
    }
}

/// Fingerprint bookkeeping over the device's key-value store
pub struct FingerprintStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> FingerprintStore<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn key(item_type: &str, entity_id: &str) -> String {
        format!("{FINGERPRINT_KEY_PREFIX}{item_type}_{entity_id}")
    }

    pub fn get(&self, item_type: &str, entity_id: &str) -> Result<Option<Fingerprint>> {
        let key = Self::key(item_type, entity_id);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let fingerprint = Fingerprint::decode(&raw);
        if fingerprint.is_none() {
            tracing::warn!("Ignoring unreadable fingerprint at {key}");
        }
        Ok(fingerprint)
    }

    /// Record a fingerprint. Call only after the matching remote write succeeded.
    pub fn record(&self, item_type: &str, entity_id: &str, fingerprint: &Fingerprint) -> Result<()> {
        let raw = serde_json::to_string(fingerprint)?;
        self.store.set(&Self::key(item_type, entity_id), &raw)
    }

    pub fn record_entity(&self, item_type: &str, entity_id: &str, entity: &Entity) -> Result<()> {
        self.record(item_type, entity_id, &Fingerprint::of_entity(entity))
    }

    pub fn record_values(&self, item_type: &str, entity_id: &str, values: &[Value]) -> Result<()> {
        self.record(item_type, entity_id, &Fingerprint::of_values(values))
    }

    /// Tombstone an entity this device deleted upstream
    pub fn mark_deleted(&self, item_type: &str, entity_id: &str, deleted_at: i64) -> Result<()> {
        self.record(item_type, entity_id, &Fingerprint::Deleted { deleted_at })
    }

    pub fn remove(&self, item_type: &str, entity_id: &str) -> Result<()> {
        self.store.remove(&Self::key(item_type, entity_id))
    }

    /// Fingerprint of an entity whose content is present again.
    ///
    /// A tombstone is removed and reads as `None`: the entity came back after
    /// this device deleted it, so nothing about its content was ever written
    /// from here.
    pub fn get_or_revive(&self, item_type: &str, entity_id: &str) -> Result<Option<Fingerprint>> {
        match self.get(item_type, entity_id)? {
            Some(fingerprint) if fingerprint.is_tombstone() => {
                tracing::debug!(item_type, entity_id, "Clearing tombstone of recreated entity");
                self.remove(item_type, entity_id)?;
                Ok(None)
            }
            fingerprint => Ok(fingerprint),
        }
    }

    /// Drop tombstones of `item_type` deleted at or before `cutoff` whose ids
    /// are not in `live_ids`. Returns the pruned ids.
    pub fn prune_tombstones(
        &self,
        item_type: &str,
        live_ids: &HashSet<&str>,
        cutoff: i64,
    ) -> Result<Vec<String>> {
        let mut pruned = Vec::new();
        for entity_id in self.entity_ids(item_type)? {
            if live_ids.contains(entity_id.as_str()) {
                continue;
            }
            let Some(Fingerprint::Deleted { deleted_at }) = self.get(item_type, &entity_id)? else {
                continue;
            };
            if deleted_at <= cutoff {
                self.remove(item_type, &entity_id)?;
                pruned.push(entity_id);
            }
        }
        Ok(pruned)
    }

    /// Ids that currently have a fingerprint for `item_type`
    pub fn entity_ids(&self, item_type: &str) -> Result<Vec<String>> {
        let prefix = Self::key(item_type, "");
        Ok(self
            .store
            .keys_with_prefix(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Whether content with `digest` still has to be written upstream.
    ///
    /// True without a fingerprint or when the last write differs; false for
    /// entities this device deleted upstream.
    pub fn is_pending(&self, item_type: &str, entity_id: &str, digest: &ContentDigest) -> Result<bool> {
        Ok(match self.get(item_type, entity_id)? {
            None => true,
            Some(fingerprint) if fingerprint.is_tombstone() => false,
            Some(fingerprint) => !fingerprint.matches(digest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn memo(content: &str, updated_at: i64) -> Entity {
        Entity::from_value(json!({"id": "n1", "content": content, "updatedAt": updated_at}))
            .unwrap()
    }

    #[test]
    fn record_and_get_round_trip() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let entity = memo("A", 100);

        assert_eq!(fingerprints.get("memo", "n1").unwrap(), None);
        fingerprints.record_entity("memo", "n1", &entity).unwrap();

        let fingerprint = fingerprints.get("memo", "n1").unwrap().unwrap();
        assert!(fingerprint.matches(&ContentDigest::of_entity(&entity)));
        assert!(!fingerprint.matches(&ContentDigest::of_entity(&memo("B", 100))));
        assert_eq!(fingerprint.synced_at(), 100);
        assert!(store.get("firestore_saved_memo_n1").unwrap().is_some());
    }

    #[test]
    fn legacy_raw_payload_reads_as_written_fingerprint() {
        let store = MemoryStore::new();
        store
            .set(
                "firestore_saved_memo_n1",
                r#"{"updatedAt":100,"content":"A","id":"n1"}"#,
            )
            .unwrap();

        let fingerprint = FingerprintStore::new(&store)
            .get("memo", "n1")
            .unwrap()
            .unwrap();
        assert!(fingerprint.matches(&ContentDigest::of_entity(&memo("A", 100))));
        assert_eq!(fingerprint.synced_at(), 100);
    }

    #[test]
    fn legacy_deleted_marker_reads_as_tombstone() {
        let store = MemoryStore::new();
        store
            .set("firestore_saved_calendar_2025-01-01", "DELETED")
            .unwrap();

        let fingerprint = FingerprintStore::new(&store)
            .get("calendar", "2025-01-01")
            .unwrap()
            .unwrap();
        assert!(fingerprint.is_tombstone());
        assert_eq!(fingerprint.synced_at(), 0);
    }

    #[test]
    fn unreadable_fingerprint_counts_as_missing() {
        let store = MemoryStore::new();
        store.set("firestore_saved_memo_n1", "{broken").unwrap();
        assert_eq!(FingerprintStore::new(&store).get("memo", "n1").unwrap(), None);
    }

    #[test]
    fn pending_excludes_current_and_tombstoned_entities() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let synced = memo("A", 1);
        fingerprints.record_entity("memo", "n1", &synced).unwrap();
        fingerprints.mark_deleted("memo", "n2", 5).unwrap();

        let digest = ContentDigest::of_entity(&synced);
        assert!(!fingerprints.is_pending("memo", "n1", &digest).unwrap());
        assert!(fingerprints
            .is_pending("memo", "n1", &ContentDigest::of_entity(&memo("B", 2)))
            .unwrap());
        assert!(!fingerprints.is_pending("memo", "n2", &digest).unwrap());
        assert!(fingerprints.is_pending("memo", "n3", &digest).unwrap());
    }

    #[test]
    fn tombstone_compares_at_its_deletion_time() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints.mark_deleted("memo", "n1", 42).unwrap();
        assert_eq!(fingerprints.get("memo", "n1").unwrap().unwrap().synced_at(), 42);
    }

    #[test]
    fn revive_clears_tombstone_but_keeps_written_fingerprint() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let synced = memo("A", 1);
        fingerprints.record_entity("memo", "n1", &synced).unwrap();
        fingerprints.mark_deleted("memo", "n2", 5).unwrap();

        assert_eq!(
            fingerprints.get_or_revive("memo", "n1").unwrap(),
            Some(Fingerprint::of_entity(&synced))
        );
        assert_eq!(fingerprints.get_or_revive("memo", "n2").unwrap(), None);
        assert_eq!(fingerprints.get("memo", "n2").unwrap(), None);
        assert!(fingerprints
            .is_pending("memo", "n2", &ContentDigest::of_entity(&synced))
            .unwrap());
    }

    #[test]
    fn prune_drops_only_old_tombstones_of_gone_ids() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints.record_entity("calendar", "2025-01-01", &memo("A", 1)).unwrap();
        fingerprints.mark_deleted("calendar", "2025-01-02", 10).unwrap();
        fingerprints.mark_deleted("calendar", "2025-01-03", 500).unwrap();
        fingerprints.mark_deleted("calendar", "2025-01-04", 10).unwrap();
        store
            .set("firestore_saved_calendar_2025-01-05", "DELETED")
            .unwrap();

        let live = HashSet::from(["2025-01-04"]);
        let pruned = fingerprints.prune_tombstones("calendar", &live, 100).unwrap();

        assert_eq!(pruned, vec!["2025-01-02", "2025-01-05"]);
        assert_eq!(
            fingerprints.entity_ids("calendar").unwrap(),
            vec!["2025-01-01", "2025-01-03", "2025-01-04"]
        );
    }

    #[test]
    fn entity_ids_lists_one_item_type() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints.record_entity("memo", "n1", &memo("A", 1)).unwrap();
        fingerprints.mark_deleted("memo", "n2", 5).unwrap();
        fingerprints.record_entity("folder", "f1", &memo("A", 1)).unwrap();

        assert_eq!(fingerprints.entity_ids("memo").unwrap(), vec!["n1", "n2"]);

        fingerprints.remove("memo", "n1").unwrap();
        assert_eq!(fingerprints.entity_ids("memo").unwrap(), vec!["n2"]);
    }
}
