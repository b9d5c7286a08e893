//! Entity and collection merging.
//!
//! Resolution is whole-entity last-writer-wins anchored on fingerprints:
//! 1. Local copy identical to what this device last wrote: remote wins.
//! 2. Otherwise the remote copy wins only if it is newer than the last
//!    synced state (or, without a fingerprint, newer than the local copy).
//! 3. Ties keep local, so unsynced work is never silently discarded.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use super::canonical::ContentDigest;
use super::fingerprint::{Fingerprint, FingerprintStore};
use super::timestamp::timestamp_of;
use crate::error::Result;
use crate::models::{Entity, Side, SyncConflict};
use crate::store::KeyValueStore;

/// Outcome of resolving one entity, date key, or document present on both sides
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    pub value: T,
    pub winner: Side,
    /// Set when local content had diverged and timestamps decided
    pub conflict: Option<SyncConflict>,
}

impl<T> Merged<T> {
    pub(crate) const fn remote(value: T) -> Self {
        Self {
            value,
            winner: Side::Remote,
            conflict: None,
        }
    }
}

/// Local side of a comparison
pub(crate) struct LocalState {
    pub digest: ContentDigest,
    pub updated_at: i64,
}

/// Winner for a copy present on both sides, given the fingerprint.
pub(crate) fn decide(
    item_type: &str,
    entity_id: &str,
    remote_updated_at: i64,
    local: &LocalState,
    fingerprint: Option<&Fingerprint>,
) -> (Side, Option<SyncConflict>) {
    if fingerprint.is_some_and(|fingerprint| fingerprint.matches(&local.digest)) {
        return (Side::Remote, None);
    }

    // No fingerprint: this device never wrote the entity successfully, so the
    // local timestamp stands in and a first sync attempt is not discarded.
    let synced_updated_at = fingerprint.map_or(local.updated_at, Fingerprint::synced_at);
    let winner = if remote_updated_at > synced_updated_at {
        Side::Remote
    } else {
        Side::Local
    };

    tracing::debug!(
        item_type,
        entity_id,
        remote_updated_at,
        synced_updated_at,
        local_updated_at = local.updated_at,
        %winner,
        "Resolved sync conflict by timestamp"
    );

    let conflict = SyncConflict {
        item_type: item_type.to_string(),
        entity_id: entity_id.to_string(),
        local_updated_at: local.updated_at,
        remote_updated_at,
        synced_updated_at,
        fingerprint_missing: fingerprint.is_none(),
        winner,
    };
    (winner, Some(conflict))
}

/// Decide which copy of an entity survives.
///
/// Without a local copy the remote one is returned unchanged. A remote copy
/// of an id this device deleted clears the tombstone, so later local edits
/// are compared and uploaded like any never-synced work.
pub fn merge_entity<S: KeyValueStore + ?Sized>(
    remote: Entity,
    local: Option<Entity>,
    item_type: &str,
    fingerprints: &FingerprintStore<'_, S>,
) -> Result<Merged<Entity>> {
    let Some(local) = local else {
        if let Some(entity_id) = remote.id() {
            fingerprints.get_or_revive(item_type, &entity_id)?;
        }
        return Ok(Merged::remote(remote));
    };

    let entity_id = remote
        .id()
        .or_else(|| local.id())
        .map(Cow::into_owned)
        .unwrap_or_default();
    let fingerprint = if entity_id.is_empty() {
        None
    } else {
        fingerprints.get_or_revive(item_type, &entity_id)?
    };

    let local_state = LocalState {
        digest: ContentDigest::of_entity(&local),
        updated_at: timestamp_of(Some(&local)),
    };
    let (winner, conflict) = decide(
        item_type,
        &entity_id,
        timestamp_of(Some(&remote)),
        &local_state,
        fingerprint.as_ref(),
    );

    let value = match winner {
        Side::Remote => remote,
        Side::Local => local,
    };
    Ok(Merged {
        value,
        winner,
        conflict,
    })
}

/// Resolve an entity present locally but absent from the remote snapshot.
///
/// Returns the entity when it was never synced (new local work). When a
/// fingerprint exists the entity was deleted upstream: the fingerprint is
/// removed and `None` tells the caller to drop the entity.
pub fn resolve_local_only<S: KeyValueStore + ?Sized>(
    local: Entity,
    item_type: &str,
    fingerprints: &FingerprintStore<'_, S>,
) -> Result<Option<Entity>> {
    let Some(entity_id) = local.id().map(Cow::into_owned) else {
        return Ok(Some(local));
    };

    if fingerprints.get(item_type, &entity_id)?.is_none() {
        return Ok(Some(local));
    }

    tracing::debug!(item_type, %entity_id, "Dropping entity deleted upstream");
    fingerprints.remove(item_type, &entity_id)?;
    Ok(None)
}

/// Result of merging one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionMerge {
    /// Reconciled collection: remote-driven entries first, then kept local-only ones
    pub merged: Vec<Entity>,
    pub conflicts: Vec<SyncConflict>,
    /// Local-only ids kept as new, never-synced work
    pub kept_local: Vec<String>,
    /// Local-only ids dropped because they were deleted upstream
    pub dropped: Vec<String>,
    /// Local entities discarded for lacking an id
    pub invalid_local: usize,
}

/// Merge a remote snapshot with the local cache of one collection.
///
/// Ids present on both sides go through [`merge_entity`] exactly once; local
/// ids missing remotely go through [`resolve_local_only`]. No ordering beyond
/// remote-first is guaranteed.
pub fn merge_collection<S: KeyValueStore + ?Sized>(
    remote: Vec<Entity>,
    local: Vec<Entity>,
    item_type: &str,
    fingerprints: &FingerprintStore<'_, S>,
) -> Result<CollectionMerge> {
    let remote_ids: HashSet<String> = remote
        .iter()
        .filter_map(|entity| entity.id().map(Cow::into_owned))
        .collect();

    let mut report = CollectionMerge::default();
    let mut local_by_id: HashMap<String, Entity> = HashMap::new();
    let mut local_only: Vec<(String, Entity)> = Vec::new();
    let mut seen_local_only: HashSet<String> = HashSet::new();

    for entity in local {
        let Some(entity_id) = entity.id().map(Cow::into_owned) else {
            tracing::warn!(item_type, "Discarding local entity without an id");
            report.invalid_local += 1;
            continue;
        };
        if remote_ids.contains(&entity_id) {
            local_by_id.entry(entity_id).or_insert(entity);
        } else if seen_local_only.insert(entity_id.clone()) {
            local_only.push((entity_id, entity));
        } else {
            tracing::debug!(item_type, %entity_id, "Skipping duplicate local entity");
        }
    }

    report.merged.reserve(remote.len() + local_only.len());
    for remote_entity in remote {
        let local_entity = remote_entity
            .id()
            .and_then(|entity_id| local_by_id.get(&*entity_id))
            .cloned();
        let merged = merge_entity(remote_entity, local_entity, item_type, fingerprints)?;
        report.conflicts.extend(merged.conflict);
        report.merged.push(merged.value);
    }

    for (entity_id, entity) in local_only {
        match resolve_local_only(entity, item_type, fingerprints)? {
            Some(kept) => {
                report.kept_local.push(entity_id);
                report.merged.push(kept);
            }
            None => report.dropped.push(entity_id),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).unwrap()
    }

    fn memo(id: &str, content: &str, updated_at: i64) -> Entity {
        entity(json!({"id": id, "content": content, "updatedAt": updated_at}))
    }

    #[test]
    fn remote_copy_of_deleted_entity_clears_tombstone() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints.mark_deleted("memo", "n1", 50).unwrap();

        let remote = memo("n1", "back", 500);
        merge_entity(remote.clone(), None, "memo", &fingerprints).unwrap();
        assert_eq!(fingerprints.get("memo", "n1").unwrap(), None);

        fingerprints.mark_deleted("memo", "n1", 50).unwrap();
        let merged =
            merge_entity(remote, Some(memo("n1", "edited", 600)), "memo", &fingerprints).unwrap();
        assert_eq!(merged.winner, Side::Local);
        assert!(merged.conflict.unwrap().fingerprint_missing);
        assert_eq!(fingerprints.get("memo", "n1").unwrap(), None);
    }

    #[test]
    fn remote_returned_when_local_absent() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let remote = memo("n1", "A", 100);

        let merged = merge_entity(remote.clone(), None, "memo", &fingerprints).unwrap();
        assert_eq!(merged, Merged::remote(remote));
    }

    #[test]
    fn untouched_local_yields_remote_regardless_of_timestamps() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = memo("n1", "A", 500);
        fingerprints.record_entity("memo", "n1", &local).unwrap();

        // Remote is older than local, but local was never edited after the last write.
        let remote = memo("n1", "B", 10);
        let merged = merge_entity(remote.clone(), Some(local), "memo", &fingerprints).unwrap();
        assert_eq!(merged.value, remote);
        assert_eq!(merged.conflict, None);
    }

    #[test]
    fn untouched_check_ignores_key_order() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let written: Entity =
            serde_json::from_str(r#"{"id":"n1","content":"A","updatedAt":100}"#).unwrap();
        fingerprints.record_entity("memo", "n1", &written).unwrap();

        let local: Entity =
            serde_json::from_str(r#"{"updatedAt":100,"content":"A","id":"n1"}"#).unwrap();
        let remote = memo("n1", "remote", 50);
        let merged = merge_entity(remote.clone(), Some(local), "memo", &fingerprints).unwrap();
        assert_eq!(merged.value, remote);
    }

    #[test]
    fn remote_newer_than_fingerprint_wins_even_if_local_is_newer() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_entity("memo", "n1", &memo("n1", "synced", 100))
            .unwrap();

        let local = memo("n1", "edited offline", 150);
        let remote = memo("n1", "edited elsewhere", 120);
        let merged = merge_entity(remote.clone(), Some(local), "memo", &fingerprints).unwrap();

        assert_eq!(merged.value, remote);
        let conflict = merged.conflict.unwrap();
        assert_eq!(conflict.synced_updated_at, 100);
        assert_eq!(conflict.local_updated_at, 150);
        assert_eq!(conflict.winner, Side::Remote);
        assert!(!conflict.fingerprint_missing);
    }

    #[test]
    fn local_edit_wins_when_remote_not_newer_than_fingerprint() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_entity("memo", "n1", &memo("n1", "synced", 100))
            .unwrap();

        let local = memo("n1", "edited offline", 150);
        let remote = memo("n1", "synced", 100);
        let merged = merge_entity(remote, Some(local.clone()), "memo", &fingerprints).unwrap();
        assert_eq!(merged.value, local);
        assert_eq!(merged.winner, Side::Local);
    }

    #[test]
    fn missing_fingerprint_compares_against_local_timestamp() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);

        let local = memo("n1", "failed write", 200);
        let older_remote = memo("n1", "remote", 150);
        let merged =
            merge_entity(older_remote, Some(local.clone()), "memo", &fingerprints).unwrap();
        assert_eq!(merged.value, local);
        assert!(merged.conflict.unwrap().fingerprint_missing);

        let newer_remote = memo("n1", "remote", 250);
        let merged =
            merge_entity(newer_remote.clone(), Some(local), "memo", &fingerprints).unwrap();
        assert_eq!(merged.value, newer_remote);
    }

    #[test]
    fn tombstoned_entity_recreated_remotely_takes_remote() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints.mark_deleted("memo", "n1", 100).unwrap();

        let remote = memo("n1", "recreated", 300);
        let merged =
            merge_entity(remote.clone(), Some(memo("n1", "stale", 50)), "memo", &fingerprints)
                .unwrap();
        assert_eq!(merged.value, remote);
    }

    #[test]
    fn never_synced_local_only_entity_is_kept() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = memo("n2", "new", 200);

        let resolved = resolve_local_only(local.clone(), "memo", &fingerprints).unwrap();
        assert_eq!(resolved, Some(local));
    }

    #[test]
    fn synced_local_only_entity_is_dropped_and_fingerprint_removed() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = memo("n2", "gone upstream", 200);
        fingerprints.record_entity("memo", "n2", &local).unwrap();

        assert_eq!(resolve_local_only(local, "memo", &fingerprints).unwrap(), None);
        assert_eq!(fingerprints.get("memo", "n2").unwrap(), None);
    }

    #[test]
    fn collection_scenario_keeps_shared_and_new_entities() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let remote = vec![memo("n1", "A", 100)];
        let local = vec![memo("n1", "A", 100), memo("n2", "new", 200)];

        let report = merge_collection(remote, local, "memo", &fingerprints).unwrap();
        assert_eq!(
            report.merged,
            vec![memo("n1", "A", 100), memo("n2", "new", 200)]
        );
        assert_eq!(report.kept_local, vec!["n2"]);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn collection_propagates_remote_deletion() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let deleted = memo("n3", "deleted elsewhere", 100);
        fingerprints.record_entity("memo", "n3", &deleted).unwrap();

        let report =
            merge_collection(vec![memo("n1", "A", 1)], vec![deleted], "memo", &fingerprints)
                .unwrap();
        assert_eq!(report.merged, vec![memo("n1", "A", 1)]);
        assert_eq!(report.dropped, vec!["n3"]);
        assert_eq!(fingerprints.get("memo", "n3").unwrap(), None);
    }

    #[test]
    fn collection_resolves_shared_ids_only_once() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        // A fingerprint exists, so the local-only path would drop this id.
        fingerprints
            .record_entity("folder", "f1", &memo("f1", "old", 10))
            .unwrap();

        let local = memo("f1", "renamed", 50);
        let remote = memo("f1", "old", 10);
        let report =
            merge_collection(vec![remote], vec![local.clone()], "folder", &fingerprints).unwrap();
        assert_eq!(report.merged, vec![local]);
        assert!(report.dropped.is_empty());
        assert!(fingerprints.get("folder", "f1").unwrap().is_some());
    }

    #[test]
    fn collection_discards_local_entities_without_id_and_duplicates() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = vec![
            entity(json!({"content": "orphan"})),
            memo("n2", "first", 1),
            memo("n2", "second", 2),
        ];

        let report = merge_collection(Vec::new(), local, "activity", &fingerprints).unwrap();
        assert_eq!(report.merged, vec![memo("n2", "first", 1)]);
        assert_eq!(report.invalid_local, 1);
    }

    #[test]
    fn repeated_cycles_converge() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_entity("memo", "n1", &memo("n1", "base", 100))
            .unwrap();
        let mut remote = vec![memo("n1", "base", 100)];
        let mut local = vec![memo("n1", "offline edit", 150)];

        for _ in 0..3 {
            let report =
                merge_collection(remote.clone(), local.clone(), "memo", &fingerprints).unwrap();
            // Adopt the result locally and push it, recording the write.
            for entity in &report.merged {
                fingerprints.record_entity("memo", "n1", entity).unwrap();
            }
            remote.clone_from(&report.merged);
            local = report.merged;
        }

        assert_eq!(local, vec![memo("n1", "offline edit", 150)]);
        let report = merge_collection(remote, local.clone(), "memo", &fingerprints).unwrap();
        assert_eq!(report.merged, local);
        assert!(report.conflicts.is_empty());
    }
}
