use std::path::Path;

use memosync_core::models::DataShape;
use memosync_core::store::LocalCache;
use memosync_core::{DataType, KeyValueStore};
use serde_json::Value;

use crate::commands::common::{
    parse_calendar, parse_collection, parse_macros, parse_settings, read_json,
};
use crate::error::CliError;

pub fn run_local_import<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: DataType,
    file: &Path,
) -> Result<(), CliError> {
    let label = file.display().to_string();
    import_snapshot(store, user_id, data_type, &label, read_json(file)?)?;
    println!("Imported {data_type} into the local cache");
    Ok(())
}

pub fn run_local_show<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: DataType,
) -> Result<(), CliError> {
    let cached = cached_value(store, user_id, data_type)?;
    println!("{}", serde_json::to_string_pretty(&cached)?);
    Ok(())
}

/// Replace the cached data of `data_type` with a validated snapshot.
pub fn import_snapshot<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: DataType,
    label: &str,
    snapshot: Value,
) -> Result<(), CliError> {
    let cache = LocalCache::new(store, user_id);
    match data_type.shape() {
        DataShape::Collection => {
            cache.save_collection(data_type, &parse_collection(label, snapshot)?)?;
        }
        DataShape::Calendar => cache.save_calendar(&parse_calendar(label, snapshot)?)?,
        DataShape::Settings => {
            cache.save_settings(&parse_settings(label, snapshot)?.unwrap_or_default())?;
        }
        DataShape::Macros => cache.save_macros(&parse_macros(label, snapshot)?)?,
    }
    Ok(())
}

pub fn cached_value<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: DataType,
) -> Result<Value, CliError> {
    let cache = LocalCache::new(store, user_id);
    let value = match data_type.shape() {
        DataShape::Collection => serde_json::to_value(cache.load_collection(data_type)?)?,
        DataShape::Calendar => serde_json::to_value(cache.load_calendar()?)?,
        DataShape::Settings => cache.load_settings()?.into_value(),
        DataShape::Macros => Value::Array(cache.load_macros()?),
    };
    Ok(value)
}
