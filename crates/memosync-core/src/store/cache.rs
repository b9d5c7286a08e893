//! Typed access to the locally cached collections of one user

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::KeyValueStore;
use crate::error::Result;
use crate::models::{Calendar, DataType, Entity};

/// Key prefix of cached collections: `cache_<userId>_<dataType>`
pub const CACHE_KEY_PREFIX: &str = "cache_";

/// The on-device copy of a user's data, one JSON value per data type
pub struct LocalCache<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    user_id: &'a str,
}

impl<'a, S: KeyValueStore + ?Sized> LocalCache<'a, S> {
    pub const fn new(store: &'a S, user_id: &'a str) -> Self {
        Self { store, user_id }
    }

    pub fn key(user_id: &str, data_type: DataType) -> String {
        format!("{CACHE_KEY_PREFIX}{user_id}_{data_type}")
    }

    pub fn load_collection(&self, data_type: DataType) -> Result<Vec<Entity>> {
        self.load(data_type)
    }

    pub fn save_collection(&self, data_type: DataType, entities: &[Entity]) -> Result<()> {
        self.save(data_type, entities)
    }

    pub fn load_calendar(&self) -> Result<Calendar> {
        self.load(DataType::Calendar)
    }

    pub fn save_calendar(&self, calendar: &Calendar) -> Result<()> {
        self.save(DataType::Calendar, calendar)
    }

    pub fn load_settings(&self) -> Result<Entity> {
        self.load(DataType::Settings)
    }

    pub fn save_settings(&self, settings: &Entity) -> Result<()> {
        self.save(DataType::Settings, settings)
    }

    pub fn load_macros(&self) -> Result<Vec<Value>> {
        self.load(DataType::Macros)
    }

    pub fn save_macros(&self, macros: &[Value]) -> Result<()> {
        self.save(DataType::Macros, macros)
    }

    /// Drop the cached copy of a data type
    pub fn clear(&self, data_type: DataType) -> Result<()> {
        self.store.remove(&Self::key(self.user_id, data_type))
    }

    /// Load a cached value, defaulting when nothing is cached yet
    fn load<T: DeserializeOwned + Default>(&self, data_type: DataType) -> Result<T> {
        match self.store.get(&Self::key(self.user_id, data_type))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, data_type: DataType, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&Self::key(self.user_id, data_type), &raw)
    }
}
