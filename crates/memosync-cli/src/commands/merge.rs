use std::path::Path;

use memosync_core::models::DataShape;
use memosync_core::sync::{
    merge_calendar, merge_collection, merge_macros, merge_settings, FingerprintStore,
};
use memosync_core::{DataType, KeyValueStore, SyncConflict, SyncEngineConfig};
use serde::Serialize;
use serde_json::Value;

use crate::commands::common::{
    parse_calendar, parse_collection, parse_macros, parse_settings, read_json, write_json,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MergeOutput {
    pub data_type: DataType,
    pub merged: Value,
    pub conflicts: Vec<SyncConflict>,
    pub kept_local: Vec<String>,
    pub dropped: Vec<String>,
    /// Local settings won over a remote document and should be written back
    pub push_requested: bool,
}

impl MergeOutput {
    fn new(data_type: DataType, merged: Value) -> Self {
        Self {
            data_type,
            merged,
            conflicts: Vec::new(),
            kept_local: Vec::new(),
            dropped: Vec::new(),
            push_requested: false,
        }
    }
}

pub fn run_merge<S: KeyValueStore + ?Sized>(
    store: &S,
    config: &SyncEngineConfig,
    data_type: DataType,
    remote_path: &Path,
    local_path: &Path,
    output_path: Option<&Path>,
    with_report: bool,
) -> Result<(), CliError> {
    let output = merge_snapshots(
        store,
        config,
        data_type,
        read_json(remote_path)?,
        read_json(local_path)?,
    )?;

    for conflict in &output.conflicts {
        tracing::info!(
            entity_id = %conflict.entity_id,
            winner = %conflict.winner,
            "Resolved {} conflict by timestamp",
            conflict.item_type
        );
    }

    if with_report {
        write_json(&serde_json::to_value(&output)?, output_path)
    } else {
        write_json(&output.merged, output_path)
    }
}

/// Merge two snapshots of `data_type` against the fingerprints in `store`.
///
/// Fingerprints of entities deleted upstream are removed, exactly as during a
/// sync cycle; nothing else in the store changes.
pub fn merge_snapshots<S: KeyValueStore + ?Sized>(
    store: &S,
    config: &SyncEngineConfig,
    data_type: DataType,
    remote: Value,
    local: Value,
) -> Result<MergeOutput, CliError> {
    let fingerprints = FingerprintStore::new(store);

    let output = match data_type.shape() {
        DataShape::Collection => {
            let merge = merge_collection(
                parse_collection("remote", remote)?,
                parse_collection("local", local)?,
                data_type.item_type(),
                &fingerprints,
            )?;
            let mut output = MergeOutput::new(data_type, serde_json::to_value(&merge.merged)?);
            output.conflicts = merge.conflicts;
            output.kept_local = merge.kept_local;
            output.dropped = merge.dropped;
            output
        }
        DataShape::Calendar => {
            let merge = merge_calendar(
                &parse_calendar("remote", remote)?,
                &parse_calendar("local", local)?,
                &fingerprints,
            )?;
            let mut output = MergeOutput::new(data_type, serde_json::to_value(&merge.merged)?);
            output.conflicts = merge.conflicts;
            output.kept_local = merge.kept_local;
            output
        }
        DataShape::Settings => {
            let remote = parse_settings("remote", remote)?;
            let local = parse_settings("local", local)?.unwrap_or_default();
            let mut push_requested = false;
            let merged = merge_settings(remote, local, &fingerprints, |_| push_requested = true)?;
            let mut output = MergeOutput::new(data_type, merged.value.into_value());
            output.conflicts.extend(merged.conflict);
            output.push_requested = push_requested;
            output
        }
        DataShape::Macros => {
            let remote = if remote.is_null() {
                None
            } else {
                Some(parse_macros("remote", remote)?)
            };
            let merged = merge_macros(
                remote,
                parse_macros("local", local)?,
                &fingerprints,
                config.macro_policy,
            )?;
            let mut output = MergeOutput::new(data_type, Value::Array(merged.value));
            output.conflicts.extend(merged.conflict);
            output
        }
    };

    Ok(output)
}
