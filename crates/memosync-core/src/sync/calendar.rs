//! Calendar merging, keyed by date instead of entity id.

use std::collections::BTreeSet;

use super::canonical::ContentDigest;
use super::fingerprint::FingerprintStore;
use super::merge::{decide, LocalState};
use super::timestamp::list_timestamp;
use crate::error::Result;
use crate::models::{Calendar, DataType, Side, SyncConflict};
use crate::store::KeyValueStore;

/// Result of merging two calendars
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarMerge {
    pub merged: Calendar,
    pub conflicts: Vec<SyncConflict>,
    /// Date keys present only locally
    pub kept_local: Vec<String>,
}

/// Merge calendars over the union of their date keys.
///
/// A day on one side only is copied through. A day on both sides is resolved
/// as a whole list against the `calendar_<dateKey>` fingerprint, with the
/// newest entry timestamp standing in for the day's timestamp.
pub fn merge_calendar<S: KeyValueStore + ?Sized>(
    remote: &Calendar,
    local: &Calendar,
    fingerprints: &FingerprintStore<'_, S>,
) -> Result<CalendarMerge> {
    let item_type = DataType::Calendar.item_type();
    let date_keys: BTreeSet<&str> = remote.date_keys().chain(local.date_keys()).collect();

    let mut report = CalendarMerge::default();
    for date_key in date_keys {
        // Date keys get reused, so a day present on either side outlives a
        // tombstone left by deleting it earlier.
        let merged_day = match (remote.day(date_key), local.day(date_key)) {
            (Some(remote_day), None) => {
                fingerprints.get_or_revive(item_type, date_key)?;
                remote_day
            }
            (None, Some(local_day)) => {
                fingerprints.get_or_revive(item_type, date_key)?;
                report.kept_local.push(date_key.to_string());
                local_day
            }
            (Some(remote_day), Some(local_day)) => {
                let local_state = LocalState {
                    digest: ContentDigest::of_values(local_day),
                    updated_at: list_timestamp(local_day),
                };
                let fingerprint = fingerprints.get_or_revive(item_type, date_key)?;
                let (winner, conflict) = decide(
                    item_type,
                    date_key,
                    list_timestamp(remote_day),
                    &local_state,
                    fingerprint.as_ref(),
                );
                report.conflicts.extend(conflict);
                match winner {
                    Side::Remote => remote_day,
                    Side::Local => local_day,
                }
            }
            (None, None) => continue,
        };
        report.merged.insert(date_key, merged_day.to_vec());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn calendar(days: &[(&str, Vec<Value>)]) -> Calendar {
        days.iter()
            .map(|(key, schedules)| ((*key).to_string(), schedules.clone()))
            .collect()
    }

    #[test]
    fn disjoint_days_are_unioned_unmodified() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let remote = calendar(&[("2025-01-01", vec![json!({"title": "a"})])]);
        let local = calendar(&[("2025-01-02", vec![json!({"title": "b"})])]);

        let report = merge_calendar(&remote, &local, &fingerprints).unwrap();
        assert_eq!(
            report.merged,
            calendar(&[
                ("2025-01-01", vec![json!({"title": "a"})]),
                ("2025-01-02", vec![json!({"title": "b"})]),
            ])
        );
        assert!(report.conflicts.is_empty());
        assert_eq!(report.kept_local, vec!["2025-01-02"]);
    }

    #[test]
    fn untouched_day_takes_remote() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        let local_day = vec![json!({"title": "gym", "updatedAt": 100})];
        fingerprints
            .record_values("calendar", "2025-01-01", &local_day)
            .unwrap();

        let remote_day = vec![json!({"title": "gym moved", "updatedAt": 90})];
        let report = merge_calendar(
            &calendar(&[("2025-01-01", remote_day.clone())]),
            &calendar(&[("2025-01-01", local_day)]),
            &fingerprints,
        )
        .unwrap();
        assert_eq!(report.merged.day("2025-01-01"), Some(remote_day.as_slice()));
    }

    #[test]
    fn edited_day_resolves_as_a_whole_list() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_values(
                "calendar",
                "2025-01-01",
                &[json!({"title": "a", "updatedAt": 100})],
            )
            .unwrap();

        let local_day = vec![
            json!({"title": "a", "updatedAt": 100}),
            json!({"title": "added offline", "updatedAt": 150}),
        ];
        let remote_day = vec![json!({"title": "a", "updatedAt": 100})];
        let report = merge_calendar(
            &calendar(&[("2025-01-01", remote_day)]),
            &calendar(&[("2025-01-01", local_day.clone())]),
            &fingerprints,
        )
        .unwrap();

        assert_eq!(report.merged.day("2025-01-01"), Some(local_day.as_slice()));
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].entity_id, "2025-01-01");
        assert_eq!(report.conflicts[0].winner, Side::Local);
    }

    #[test]
    fn newer_remote_day_wins_over_local_edit() {
        let store = MemoryStore::new();
        let fingerprints = FingerprintStore::new(&store);
        fingerprints
            .record_values("calendar", "2025-01-01", &[json!({"updatedAt": 100})])
            .unwrap();

        let remote_day = vec![json!({"title": "from phone", "updatedAt": 300})];
        let report = merge_calendar(
            &calendar(&[("2025-01-01", remote_day.clone())]),
            &calendar(&[("2025-01-01", vec![json!({"title": "laptop", "updatedAt": 200})])]),
            &fingerprints,
        )
        .unwrap();
        assert_eq!(report.merged.day("2025-01-01"), Some(remote_day.as_slice()));
    }
}
