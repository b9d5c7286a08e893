//! Single-document merging: user settings and the macro list.

use serde_json::Value;

use super::canonical::ContentDigest;
use super::fingerprint::FingerprintStore;
use super::merge::{decide, LocalState, Merged};
use super::timestamp::{list_timestamp, timestamp_of};
use crate::config::MacroMergePolicy;
use crate::error::{Error, Result};
use crate::models::{Entity, Side};
use crate::store::KeyValueStore;

pub const SETTINGS_ITEM_TYPE: &str = "settings";
pub const SETTINGS_DOC_ID: &str = "main";
pub const MACROS_ITEM_TYPE: &str = "macros";
pub const MACROS_DOC_ID: &str = "all";

/// Field holding the list when the macro document is stored as an object
const MACRO_ITEMS_FIELD: &str = "items";

/// Merge the settings document.
///
/// Without a remote document local is kept and nothing is pushed. When local
/// wins over a present remote document, `push` receives the local settings so
/// the caller can write them back.
pub fn merge_settings<S, F>(
    remote: Option<Entity>,
    local: Entity,
    fingerprints: &FingerprintStore<'_, S>,
    push: F,
) -> Result<Merged<Entity>>
where
    S: KeyValueStore + ?Sized,
    F: FnOnce(&Entity),
{
    let Some(remote) = remote else {
        return Ok(Merged {
            value: local,
            winner: Side::Local,
            conflict: None,
        });
    };

    let fingerprint = fingerprints.get(SETTINGS_ITEM_TYPE, SETTINGS_DOC_ID)?;
    let local_state = LocalState {
        digest: ContentDigest::of_entity(&local),
        updated_at: timestamp_of(Some(&local)),
    };
    let (winner, conflict) = decide(
        SETTINGS_ITEM_TYPE,
        SETTINGS_DOC_ID,
        timestamp_of(Some(&remote)),
        &local_state,
        fingerprint.as_ref(),
    );

    let value = match winner {
        Side::Remote => remote,
        Side::Local => {
            push(&local);
            local
        }
    };
    Ok(Merged {
        value,
        winner,
        conflict,
    })
}

/// Merge the macro list under `policy`.
///
/// A missing remote document keeps the local list.
pub fn merge_macros<S: KeyValueStore + ?Sized>(
    remote: Option<Vec<Value>>,
    local: Vec<Value>,
    fingerprints: &FingerprintStore<'_, S>,
    policy: MacroMergePolicy,
) -> Result<Merged<Vec<Value>>> {
    let Some(remote) = remote else {
        return Ok(Merged {
            value: local,
            winner: Side::Local,
            conflict: None,
        });
    };
    let fingerprint = fingerprints.get(MACROS_ITEM_TYPE, MACROS_DOC_ID)?;
    let local_state = LocalState {
        digest: ContentDigest::of_values(&local),
        updated_at: list_timestamp(&local),
    };

    if fingerprint
        .as_ref()
        .is_some_and(|fingerprint| fingerprint.matches(&local_state.digest))
    {
        return Ok(Merged::remote(remote));
    }

    let (winner, conflict) = match policy {
        MacroMergePolicy::LocalWinsOnMismatch => {
            tracing::debug!("Macros differ from the last pushed list, keeping local");
            (Side::Local, None)
        }
        MacroMergePolicy::Timestamp => decide(
            MACROS_ITEM_TYPE,
            MACROS_DOC_ID,
            list_timestamp(&remote),
            &local_state,
            fingerprint.as_ref(),
        ),
    };

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

/// Extract the macro list from a remote document.
///
/// Accepts a bare array or an object with an `items` array. Null reads as empty.
pub fn macros_from_document(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut fields) => match fields.remove(MACRO_ITEMS_FIELD) {
            Some(Value::Array(items)) => Ok(items),
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(_) => Err(Error::InvalidInput(
                "Macro document items must be an array".to_string(),
            )),
        },
        _ => Err(Error::InvalidInput(
            "Macro document must be an array or an object".to_string(),
        )),
    }
}

/// Remote form of the macro list
pub fn macros_document(items: &[Value]) -> Value {
    serde_json::json!({ MACRO_ITEMS_FIELD: items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings(theme: &str, updated_at: i64) -> Entity {
        Entity::from_value(json!({"theme": theme, "updatedAt": updated_at})).unwrap()
    }

    #[test]
    fn missing_remote_settings_keep_local_without_push() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let mut pushed = None;

        let merged = merge_settings(None, settings("dark", 1), &fingerprints, |local| {
            pushed = Some(local.clone());
        })
        .unwrap();
        assert_eq!(merged.value, settings("dark", 1));
        assert_eq!(pushed, None);
    }

    #[test]
    fn untouched_settings_take_remote() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_entity("settings", "main", &settings("dark", 100))
            .unwrap();
        assert!(store.get("firestore_saved_settings_main").unwrap().is_some());

        let mut pushed = false;
        let merged = merge_settings(
            Some(settings("light", 50)),
            settings("dark", 100),
            &fingerprints,
            |_| pushed = true,
        )
        .unwrap();
        assert_eq!(merged.value, settings("light", 50));
        assert!(!pushed);
    }

    #[test]
    fn local_settings_win_and_are_pushed() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_entity("settings", "main", &settings("dark", 100))
            .unwrap();

        let mut pushed = None;
        let merged = merge_settings(
            Some(settings("dark", 100)),
            settings("sepia", 200),
            &fingerprints,
            |local| pushed = Some(local.clone()),
        )
        .unwrap();
        assert_eq!(merged.winner, Side::Local);
        assert_eq!(pushed, Some(settings("sepia", 200)));
    }

    #[test]
    fn macros_keep_local_when_never_pushed() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = vec![json!("/sig Best regards")];

        let merged = merge_macros(
            Some(vec![json!("/remote")]),
            local.clone(),
            &fingerprints,
            MacroMergePolicy::LocalWinsOnMismatch,
        )
        .unwrap();
        assert_eq!(merged.value, local);
    }

    #[test]
    fn macros_take_remote_when_local_matches_last_push() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = vec![json!("/sig")];
        fingerprints.record_values("macros", "all", &local).unwrap();

        let merged = merge_macros(
            Some(vec![json!("/sig"), json!("/addr")]),
            local,
            &fingerprints,
            MacroMergePolicy::LocalWinsOnMismatch,
        )
        .unwrap();
        assert_eq!(merged.winner, Side::Remote);
        assert_eq!(merged.value, vec![json!("/sig"), json!("/addr")]);
    }

    #[test]
    fn macros_keep_local_when_remote_document_missing() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local = vec![json!("/sig")];
        fingerprints.record_values("macros", "all", &local).unwrap();

        for policy in [MacroMergePolicy::LocalWinsOnMismatch, MacroMergePolicy::Timestamp] {
            let merged = merge_macros(None, local.clone(), &fingerprints, policy).unwrap();
            assert_eq!(merged.winner, Side::Local);
            assert_eq!(merged.value, local);
            assert!(merged.conflict.is_none());
        }
    }

    #[test]
    fn timestamp_policy_lets_newer_remote_macros_win() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_values("macros", "all", &[json!({"text": "a", "updatedAt": 10})])
            .unwrap();

        let remote = vec![json!({"text": "b", "updatedAt": 30})];
        let local = vec![json!({"text": "c", "updatedAt": 20})];
        let merged = merge_macros(
            Some(remote.clone()),
            local.clone(),
            &fingerprints,
            MacroMergePolicy::Timestamp,
        )
        .unwrap();
        assert_eq!(merged.value, remote);

        let merged = merge_macros(
            Some(remote),
            local.clone(),
            &fingerprints,
            MacroMergePolicy::LocalWinsOnMismatch,
        )
        .unwrap();
        assert_eq!(merged.value, local);
    }

    #[test]
    fn macro_documents_accept_array_or_items_object() {
        assert_eq!(macros_from_document(json!(["a"])).unwrap(), vec![json!("a")]);
        assert_eq!(
            macros_from_document(json!({"items": ["a"], "updatedAt": 1})).unwrap(),
            vec![json!("a")]
        );
        assert_eq!(macros_from_document(Value::Null).unwrap(), Vec::<Value>::new());
        assert!(macros_from_document(json!("a")).is_err());
        assert_eq!(
            macros_from_document(macros_document(&[json!("a")])).unwrap(),
            vec![json!("a")]
        );
    }
}
