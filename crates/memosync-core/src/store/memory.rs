//! In-memory key-value store

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Thread-safe in-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn keys_with_prefix_is_sorted_and_bounded() {
        let store = MemoryStore::new();
        for key in ["p_b", "p_a", "q_a", "p", "o_z"] {
            store.set(key, "x").unwrap();
        }
        assert_eq!(store.keys_with_prefix("p_").unwrap(), vec!["p_a", "p_b"]);
        assert_eq!(store.keys_with_prefix("p").unwrap(), vec!["p", "p_a", "p_b"]);
    }
}
