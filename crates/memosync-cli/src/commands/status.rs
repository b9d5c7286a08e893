use std::collections::BTreeMap;
use std::path::Path;

use memosync_core::sync::{
    server_millis, ConflictSummary, SyncAction, SyncMetadataTracker, SyncStrategy,
    UPDATED_AT_FIELD,
};
use memosync_core::{DataType, KeyValueStore, SyncEngineConfig};
use serde::Serialize;
use serde_json::Value;

use crate::commands::common::{format_sync_time, read_json};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub first_login: bool,
    pub strategy: SyncStrategy,
    pub summary: ConflictSummary,
}

pub fn run_status<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    config: &SyncEngineConfig,
    server_path: Option<&Path>,
    as_json: bool,
) -> Result<(), CliError> {
    let server = match server_path {
        Some(path) => parse_server_timestamps(read_json(path)?)?,
        None => BTreeMap::new(),
    };
    let tracker = SyncMetadataTracker::new(store, user_id, config.thresholds());
    let strategy = tracker.decide_strategy(&server)?;
    let output = StatusOutput {
        first_login: tracker.is_first_login()?,
        summary: strategy.summary(),
        strategy,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in format_status_lines(&output) {
        println!("{line}");
    }
    Ok(())
}

/// Server last-update times: data type name to epoch millis, a remote
/// timestamp object, or a document carrying `updatedAt`. Nulls are skipped.
pub fn parse_server_timestamps(value: Value) -> Result<BTreeMap<DataType, i64>, CliError> {
    let fields = match value {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(fields) => fields,
        _ => {
            return Err(CliError::InvalidServerTimestamps(
                "expected an object keyed by data type".to_string(),
            ))
        }
    };

    let mut timestamps = BTreeMap::new();
    for (key, value) in fields {
        let data_type = key
            .parse::<DataType>()
            .map_err(CliError::InvalidServerTimestamps)?;
        let timestamp = match &value {
            Value::Object(document) if document.contains_key(UPDATED_AT_FIELD) => {
                server_millis(document.get(UPDATED_AT_FIELD))
            }
            other => server_millis(Some(other)),
        };
        if let Some(timestamp) = timestamp {
            timestamps.insert(data_type, timestamp);
        }
    }
    Ok(timestamps)
}

pub fn format_status_lines(output: &StatusOutput) -> Vec<String> {
    let mut lines = output
        .strategy
        .entries
        .iter()
        .map(|(data_type, entry)| {
            format!(
                "{:<11} {:<8} server {:<23} local {}",
                data_type.as_str(),
                action_label(entry.action),
                format_sync_time(entry.server_timestamp),
                format_sync_time(entry.local_timestamp)
            )
        })
        .collect::<Vec<_>>();

    if output.first_login {
        lines.push("First login on this device: server data will be restored.".to_string());
    } else if output.summary.needs_user_confirmation {
        lines.push(format!(
            "Confirmation needed: {} conflict(s), {} data type(s) newer on this device.",
            output.summary.conflicts.len(),
            output.summary.local_newer.len()
        ));
    } else {
        lines.push("Server data is current.".to_string());
    }
    lines
}

pub const fn action_label(action: SyncAction) -> &'static str {
    match action {
        SyncAction::Server => "server",
        SyncAction::Local => "local",
        SyncAction::Conflict => "conflict",
        SyncAction::Unknown => "unknown",
    }
}
