//! Remote store backed by a directory tree of JSON files.
//!
//! Layout: `<root>/<user>/<dataType>/<id>.json` for collection entities and
//! `<root>/<user>/<docId>.json` for single documents. Useful for exercising
//! the sync engine between two caches without a network service.

use std::io;
use std::path::{Path, PathBuf};

use memosync_core::sync::RemoteStore;
use memosync_core::{DataType, Entity, Error, Result};
use serde_json::Value;

const JSON_EXTENSION: &str = "json";

pub struct DirectoryRemote {
    root: PathBuf,
}

impl DirectoryRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(path_segment(user_id)?))
    }

    fn collection_dir(&self, user_id: &str, data_type: DataType) -> Result<PathBuf> {
        Ok(self.user_dir(user_id)?.join(data_type.as_str()))
    }

    fn entity_path(&self, user_id: &str, data_type: DataType, entity_id: &str) -> Result<PathBuf> {
        Ok(self
            .collection_dir(user_id, data_type)?
            .join(json_file_name(entity_id)?))
    }

    fn document_path(&self, user_id: &str, doc_id: &str) -> Result<PathBuf> {
        Ok(self.user_dir(user_id)?.join(json_file_name(doc_id)?))
    }
}

impl RemoteStore for DirectoryRemote {
    async fn fetch_collection(&self, user_id: &str, data_type: DataType) -> Result<Vec<Entity>> {
        let dir = self.collection_dir(user_id, data_type)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(remote_error(&dir, &error)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| remote_error(&dir, &error))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(JSON_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut entities = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(value) = read_json(&path).await? else {
                continue;
            };
            entities.push(Entity::from_value(value)?);
        }
        Ok(entities)
    }

    async fn fetch_document(&self, user_id: &str, doc_id: &str) -> Result<Option<Value>> {
        read_json(&self.document_path(user_id, doc_id)?).await
    }

    async fn write_entity(&self, user_id: &str, data_type: DataType, entity: &Entity) -> Result<()> {
        let entity_id = entity
            .id()
            .ok_or_else(|| Error::InvalidInput(format!("{data_type} entity has no id")))?;
        let path = self.entity_path(user_id, data_type, &entity_id)?;
        write_json(&path, &serde_json::to_value(entity)?).await
    }

    async fn write_document(&self, user_id: &str, doc_id: &str, document: &Value) -> Result<()> {
        write_json(&self.document_path(user_id, doc_id)?, document).await
    }

    async fn delete_entity(&self, user_id: &str, data_type: DataType, entity_id: &str) -> Result<()> {
        let path = self.entity_path(user_id, data_type, entity_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(remote_error(&path, &error)),
        }
    }
}

async fn read_json(path: &Path) -> Result<Option<Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(remote_error(path, &error)),
    }
}

async fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| remote_error(parent, &error))?;
    }
    let rendered = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, rendered)
        .await
        .map_err(|error| remote_error(path, &error))
}

fn json_file_name(id: &str) -> Result<String> {
    Ok(format!("{}.{JSON_EXTENSION}", path_segment(id)?))
}

/// Ids become file names, so anything that could escape the directory is rejected.
fn path_segment(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "'{id}' cannot be stored in a directory remote"
        )));
    }
    Ok(id)
}

fn remote_error(path: &Path, error: &io::Error) -> Error {
    Error::Remote(format!("{}: {error}", path.display()))
}
