use std::collections::BTreeMap;

use memosync_core::sync::pending_uploads;
use memosync_core::{DataType, KeyValueStore};

use crate::error::CliError;

pub fn run_pending<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: Option<DataType>,
    as_json: bool,
) -> Result<(), CliError> {
    let pending = collect_pending(store, user_id, data_type)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.values().all(Vec::is_empty) {
        println!("Nothing pending.");
        return Ok(());
    }
    for (data_type, ids) in &pending {
        for id in ids {
            println!("{data_type}\t{id}");
        }
    }
    Ok(())
}

pub fn collect_pending<S: KeyValueStore + ?Sized>(
    store: &S,
    user_id: &str,
    data_type: Option<DataType>,
) -> Result<BTreeMap<DataType, Vec<String>>, CliError> {
    let data_types = data_type.map_or_else(|| DataType::ALL.to_vec(), |data_type| vec![data_type]);
    data_types
        .into_iter()
        .map(|data_type| Ok((data_type, pending_uploads(store, user_id, data_type)?)))
        .collect()
}
