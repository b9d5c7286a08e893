//! SQLite-backed key-value store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, KeyValueStore};
use crate::error::{Error, Result};

/// Persistent device cache stored in a single SQLite table
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("sqlite store lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, crate::util::unix_millis_now()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        // substr instead of LIKE: keys contain `_`, which LIKE treats as a wildcard
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn keys_with_prefix_treats_underscore_literally() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("firestore_saved_memo_1", "x").unwrap();
        store.set("firestore_saved_memo_2", "x").unwrap();
        store.set("firestoreXsavedXmemoX3", "x").unwrap();

        assert_eq!(
            store.keys_with_prefix("firestore_saved_memo_").unwrap(),
            vec!["firestore_saved_memo_1", "firestore_saved_memo_2"]
        );
    }

    #[test]
    fn values_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("syncTimestamp_u1_memos", "1700000000000").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("syncTimestamp_u1_memos").unwrap().as_deref(),
            Some("1700000000000")
        );
    }
}
