use std::path::Path;

use memosync_core::sync::SyncSession;
use memosync_core::{DataType, KeyValueStore, SyncEngineConfig};

use crate::error::CliError;
use crate::remote::DirectoryRemote;

pub async fn run_delete<S: KeyValueStore>(
    store: S,
    user_id: &str,
    config: SyncEngineConfig,
    remote_dir: &Path,
    data_type: DataType,
    id: &str,
) -> Result<(), CliError> {
    let session = SyncSession::new(user_id, store, DirectoryRemote::new(remote_dir), config)?;
    session.delete_entity(data_type, id.trim()).await?;
    println!("Deleted {data_type}/{}", id.trim());
    Ok(())
}
