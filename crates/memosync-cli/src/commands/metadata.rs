use chrono::DateTime;
use memosync_core::sync::SyncMetadataTracker;
use memosync_core::util::unix_millis_now;
use memosync_core::{DataType, KeyValueStore, SyncEngineConfig};

use crate::commands::common::format_sync_time;
use crate::error::CliError;

pub fn run_metadata_show<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    config: &SyncEngineConfig,
    as_json: bool,
) -> Result<(), CliError> {
    let tracker = SyncMetadataTracker::new(store, user_id, config.thresholds());
    let timestamps = tracker.all_local_timestamps()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&timestamps)?);
        return Ok(());
    }
    for (data_type, timestamp) in timestamps {
        println!("{:<11} {}", data_type.as_str(), format_sync_time(timestamp));
    }
    Ok(())
}

pub fn run_metadata_touch<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    config: &SyncEngineConfig,
    data_type: Option<DataType>,
    at: Option<&str>,
) -> Result<(), CliError> {
    let timestamp = at.map_or_else(|| Ok(unix_millis_now()), parse_time)?;
    let tracker = SyncMetadataTracker::new(store, user_id, config.thresholds());
    match data_type {
        Some(data_type) => tracker.set_local_timestamp(data_type, timestamp)?,
        None => tracker.update_all(timestamp)?,
    }
    println!("Sync time set to {}", format_sync_time(Some(timestamp)));
    Ok(())
}

pub fn run_metadata_clear<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    config: &SyncEngineConfig,
) -> Result<(), CliError> {
    SyncMetadataTracker::new(store, user_id, config.thresholds()).clear()?;
    println!("Cleared sync metadata for {user_id}");
    Ok(())
}

/// Unix milliseconds or an RFC 3339 time.
pub fn parse_time(value: &str) -> Result<i64, CliError> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(millis);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|datetime| datetime.timestamp_millis())
        .map_err(|_| CliError::InvalidTime(value.to_string()))
}
