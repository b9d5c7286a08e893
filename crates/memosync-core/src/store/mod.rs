//! Local key-value stores backing fingerprints, sync metadata and the cache

mod cache;
mod memory;
mod migrations;
mod sqlite;

pub use cache::{LocalCache, CACHE_KEY_PREFIX};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;

/// Synchronous string key-value storage on the device.
///
/// One instance is created per user session and passed explicitly to the
/// sync engine, so nothing in the engine touches process-wide state.
pub trait KeyValueStore {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}
