//! Remote document store seam

use serde_json::Value;

use crate::error::Result;
use crate::models::{DataType, Entity};

/// Per-user remote document store.
///
/// Collections hold id-bearing entities (calendar days are entities keyed by
/// date). Settings and the macro list are single documents addressed by the
/// data type name. Implementations report connectivity and server failures as
/// [`crate::Error::Remote`].
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Fetch every entity of a collection
    async fn fetch_collection(&self, user_id: &str, data_type: DataType) -> Result<Vec<Entity>>;

    /// Fetch a single document, `None` when it does not exist
    async fn fetch_document(&self, user_id: &str, doc_id: &str) -> Result<Option<Value>>;

    /// Create or replace one entity of a collection
    async fn write_entity(&self, user_id: &str, data_type: DataType, entity: &Entity)
        -> Result<()>;

    /// Create or replace a single document
    async fn write_document(&self, user_id: &str, doc_id: &str, document: &Value) -> Result<()>;

    /// Delete one entity; deleting a missing entity succeeds
    async fn delete_entity(&self, user_id: &str, data_type: DataType, entity_id: &str)
        -> Result<()>;
}
