use std::path::Path;

use memosync_core::models::DataShape;
use memosync_core::sync::{
    FingerprintStore, MACROS_DOC_ID, MACROS_ITEM_TYPE, SETTINGS_DOC_ID, SETTINGS_ITEM_TYPE,
};
use memosync_core::{DataType, KeyValueStore};
use serde_json::Value;

use crate::commands::common::{
    invalid_snapshot, parse_calendar, parse_collection, parse_macros, parse_settings, read_json,
};
use crate::error::CliError;

pub fn run_record<S: KeyValueStore + ?Sized>(
    store: &S,
    data_type: DataType,
    file: &Path,
) -> Result<(), CliError> {
    let label = file.display().to_string();
    let recorded = record_snapshot(store, data_type, &label, read_json(file)?)?;
    println!("Recorded {recorded} fingerprint(s) for {data_type}");
    Ok(())
}

/// Record every entity of a snapshot as successfully written upstream.
pub fn record_snapshot<S: KeyValueStore + ?Sized>(
    store: &S,
    data_type: DataType,
    label: &str,
    snapshot: Value,
) -> Result<usize, CliError> {
    let fingerprints = FingerprintStore::new(store);
    let item_type = data_type.item_type();

    match data_type.shape() {
        DataShape::Collection => {
            let entities = parse_collection(label, snapshot)?;
            for entity in &entities {
                let entity_id = entity
                    .id()
                    .ok_or_else(|| invalid_snapshot(label, "every entity needs an id"))?;
                fingerprints.record_entity(item_type, &entity_id, entity)?;
            }
            Ok(entities.len())
        }
        DataShape::Calendar => {
            let calendar = parse_calendar(label, snapshot)?;
            for (date_key, schedules) in calendar.iter() {
                fingerprints.record_values(item_type, date_key, schedules)?;
            }
            Ok(calendar.len())
        }
        DataShape::Settings => match parse_settings(label, snapshot)? {
            Some(settings) => {
                fingerprints.record_entity(SETTINGS_ITEM_TYPE, SETTINGS_DOC_ID, &settings)?;
                Ok(1)
            }
            None => Ok(0),
        },
        DataShape::Macros => {
            let macros = parse_macros(label, snapshot)?;
            fingerprints.record_values(MACROS_ITEM_TYPE, MACROS_DOC_ID, &macros)?;
            Ok(1)
        }
    }
}
