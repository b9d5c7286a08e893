//! Calendar model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::Entity;

/// Field holding a day's schedule list when the day travels as an entity
pub const SCHEDULES_FIELD: &str = "schedules";

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Schedules keyed by calendar date (`YYYY-MM-DD`).
///
/// A day is the unit of conflict resolution: two devices editing different
/// entries of the same day still conflict on the whole list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Calendar(BTreeMap<String, Vec<Value>>);

impl Calendar {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn day(&self, date_key: &str) -> Option<&[Value]> {
        self.0.get(date_key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, date_key: impl Into<String>, schedules: Vec<Value>) {
        self.0.insert(date_key.into(), schedules);
    }

    pub fn remove(&mut self, date_key: &str) -> Option<Vec<Value>> {
        self.0.remove(date_key)
    }

    pub fn date_keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.0
            .iter()
            .map(|(key, schedules)| (key.as_str(), schedules.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rebuild a calendar from the per-day entities a remote store returns.
    ///
    /// Entities without an id are skipped; a missing or non-array schedule
    /// field becomes an empty day.
    #[must_use]
    pub fn from_day_entities(days: Vec<Entity>) -> Self {
        let mut calendar = Self::new();
        for day in days {
            let Some(date_key) = day.id().map(std::borrow::Cow::into_owned) else {
                tracing::warn!("Skipping calendar day without a date key");
                continue;
            };
            let schedules = match day.get(SCHEDULES_FIELD) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            calendar.insert(date_key, schedules);
        }
        calendar
    }

    /// Wrap one day as an entity for remote writes.
    #[must_use]
    pub fn day_entity(date_key: &str, schedules: &[Value]) -> Entity {
        Entity::default()
            .with("id", date_key)
            .with(SCHEDULES_FIELD, Value::Array(schedules.to_vec()))
    }
}

impl FromIterator<(String, Vec<Value>)> for Calendar {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Validate a `YYYY-MM-DD` date key.
pub fn validate_date_key(date_key: &str) -> Result<()> {
    NaiveDate::parse_from_str(date_key, DATE_KEY_FORMAT)
        .map(|_| ())
        .map_err(|error| Error::InvalidInput(format!("invalid date key '{date_key}': {error}")))
}
