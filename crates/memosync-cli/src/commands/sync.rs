use std::path::Path;

use memosync_core::state::SyncState;
use memosync_core::sync::{CycleReport, PushReport, RemoteStore, SyncSession};
use memosync_core::{DataType, KeyValueStore, SyncEngineConfig};
use serde::Serialize;

use crate::error::CliError;
use crate::remote::DirectoryRemote;

#[derive(Debug, Serialize)]
pub struct SyncItem {
    pub data_type: DataType,
    pub state: SyncState,
    pub cycle: Option<CycleReport>,
    pub push: Option<PushReport>,
    pub error: Option<String>,
}

pub async fn run_sync<S: KeyValueStore>(
    store: S,
    user_id: &str,
    config: SyncEngineConfig,
    remote_dir: &Path,
    data_type: Option<DataType>,
    push: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let session = SyncSession::new(user_id, store, DirectoryRemote::new(remote_dir), config)?;
    let data_types = data_type.map_or_else(|| DataType::ALL.to_vec(), |data_type| vec![data_type]);
    let items = sync_data_types(&session, &data_types, push).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}", format_sync_line(item));
        }
    }

    let failed = items.iter().filter(|item| item.error.is_some()).count();
    if failed > 0 {
        return Err(CliError::SyncIncomplete(failed));
    }
    Ok(())
}

/// Reconcile each data type, then upload what is still pending.
///
/// A failed cycle is reported in its item and the remaining data types
/// still run.
pub async fn sync_data_types<S: KeyValueStore, R: RemoteStore>(
    session: &SyncSession<S, R>,
    data_types: &[DataType],
    push: bool,
) -> Result<Vec<SyncItem>, CliError> {
    let mut items = Vec::with_capacity(data_types.len());
    for &data_type in data_types {
        let result = session.reconcile(data_type).await;
        let state = SyncState::after_cycle(&result);
        let cycle = match result {
            Ok(cycle) => cycle,
            Err(error) => {
                tracing::warn!(%data_type, "Sync cycle failed: {error}");
                items.push(SyncItem {
                    data_type,
                    state,
                    cycle: None,
                    push: None,
                    error: Some(error.to_string()),
                });
                continue;
            }
        };

        let push = if push && !cycle.skipped {
            Some(session.push_pending(data_type).await?)
        } else {
            None
        };
        items.push(SyncItem {
            data_type,
            state,
            cycle: Some(cycle),
            push,
            error: None,
        });
    }
    Ok(items)
}

pub fn format_sync_line(item: &SyncItem) -> String {
    let Some(cycle) = &item.cycle else {
        return format!(
            "{}: {} ({})",
            item.data_type,
            state_label(item.state),
            item.error.as_deref().unwrap_or("no result")
        );
    };
    if cycle.skipped {
        return format!("{}: skipped (synced moments ago)", item.data_type);
    }

    let mut line = format!(
        "{}: {}, {} merged, {} conflict(s), {} kept local, {} dropped",
        item.data_type,
        state_label(item.state),
        cycle.merged,
        cycle.conflicts.len(),
        cycle.kept_local.len(),
        cycle.dropped.len()
    );
    if let Some(push) = &item.push {
        line.push_str(&format!(", {} uploaded", push.written.len() + cycle.pushed));
        if !push.failed.is_empty() {
            line.push_str(&format!(", {} failed", push.failed.len()));
        }
    }
    line
}

pub const fn state_label(state: SyncState) -> &'static str {
    match state {
        SyncState::Idle => "idle",
        SyncState::Offline => "offline",
        SyncState::Syncing => "already syncing",
        SyncState::Synced => "synced",
        SyncState::Error => "failed",
    }
}
