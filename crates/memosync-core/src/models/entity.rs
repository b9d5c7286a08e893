//! Entity model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::error::{Error, Result};

/// Field holding an entity's identifier
pub const ID_FIELD: &str = "id";

/// An id-bearing record subject to merge (memo, folder, trash item, activity).
///
/// Entities are free-form JSON objects. Only `id` and the timestamp fields
/// (`updatedAt`, `timestamp`) carry meaning for sync; everything else is
/// opaque content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Wrap an existing field map
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build an entity from an arbitrary JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(Error::InvalidInput(format!(
                "entity must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Identifier of this entity.
    ///
    /// Numeric ids are rendered as strings; empty strings count as missing.
    pub fn id(&self) -> Option<Cow<'_, str>> {
        match self.0.get(ID_FIELD)? {
            Value::String(id) if !id.trim().is_empty() => Some(Cow::Borrowed(id.as_str())),
            Value::Number(id) => Some(Cow::Owned(id.to_string())),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Set a field, returning the updated entity
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        entity.into_value()
    }
}

impl TryFrom<Value> for Entity {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
