use std::env;
use std::path::{Path, PathBuf};

use memosync_core::models::validate_date_key;
use memosync_core::sync::macros_from_document;
use memosync_core::util::{format_millis_utc, normalize_text_option};
use memosync_core::{Calendar, Entity, SqliteStore, SyncEngineConfig};
use serde_json::Value;

use crate::error::CliError;

const APP_DIR_NAME: &str = "memosync";
const DB_FILE_NAME: &str = "cache.db";
const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_USER_ID: &str = "local";

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("MEMOSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(DB_FILE_NAME)
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("MEMOSYNC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Explicit `--user` must be non-empty; otherwise `MEMOSYNC_USER`, then `local`.
pub fn resolve_user_id(cli_user: Option<String>) -> Result<String, CliError> {
    if let Some(user) = cli_user {
        return normalize_text_option(Some(user)).ok_or(CliError::EmptyUserId);
    }
    Ok(normalize_text_option(env::var("MEMOSYNC_USER").ok())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string()))
}

pub fn open_store(db_path: &Path) -> Result<SqliteStore, CliError> {
    Ok(SqliteStore::open(db_path)?)
}

pub fn load_engine_config(path: &Path) -> Result<SyncEngineConfig, CliError> {
    Ok(SyncEngineConfig::load_from_path(path)?)
}

pub fn read_json(path: &Path) -> Result<Value, CliError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|error| invalid_snapshot(&path.display().to_string(), error))
}

pub fn write_json(value: &Value, output_path: Option<&Path>) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}

pub fn invalid_snapshot(label: &str, message: impl ToString) -> CliError {
    CliError::InvalidSnapshot {
        path: label.to_string(),
        message: message.to_string(),
    }
}

/// A collection snapshot: an array of entities, or null for none.
pub fn parse_collection(label: &str, value: Value) -> Result<Vec<Entity>, CliError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| Entity::from_value(item).map_err(|error| invalid_snapshot(label, error)))
            .collect(),
        _ => Err(invalid_snapshot(label, "expected an array of entities")),
    }
}

/// A calendar snapshot: an object of date key to schedules, or an array of
/// remote day entities.
pub fn parse_calendar(label: &str, value: Value) -> Result<Calendar, CliError> {
    let calendar = match value {
        Value::Null => Calendar::new(),
        Value::Object(_) => {
            serde_json::from_value::<Calendar>(value).map_err(|error| invalid_snapshot(label, error))?
        }
        Value::Array(_) => Calendar::from_day_entities(parse_collection(label, value)?),
        _ => return Err(invalid_snapshot(label, "expected a calendar object or day array")),
    };
    for date_key in calendar.date_keys() {
        validate_date_key(date_key).map_err(|error| invalid_snapshot(label, error))?;
    }
    Ok(calendar)
}

/// A settings snapshot: an object, or null when the document does not exist.
pub fn parse_settings(label: &str, value: Value) -> Result<Option<Entity>, CliError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Entity::from_value(value)
            .map(Some)
            .map_err(|error| invalid_snapshot(label, error)),
        _ => Err(invalid_snapshot(label, "expected a settings object")),
    }
}

pub fn parse_macros(label: &str, value: Value) -> Result<Vec<Value>, CliError> {
    macros_from_document(value).map_err(|error| invalid_snapshot(label, error))
}

pub fn format_sync_time(timestamp: Option<i64>) -> String {
    timestamp.map_or_else(|| "never".to_string(), format_millis_utc)
}
