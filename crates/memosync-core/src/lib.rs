//! memosync-core - Core library for memosync
//!
//! This crate contains the offline-first sync engine shared by every memosync
//! client: entity models, the local key-value cache, fingerprint bookkeeping,
//! the merge algorithms, and the sync session that ties them to a remote store.

pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncEngineConfig;
pub use error::{Error, Result};
pub use models::{Calendar, DataType, Entity, SyncConflict};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
