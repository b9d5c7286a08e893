//! Timestamp extraction.
//!
//! Every comparison in the merge engine reduces an entity to one instant in
//! unix milliseconds. Malformed or missing timestamps degrade to 0, so an
//! entity without a usable timestamp always counts as the oldest version.

use serde_json::{Map, Value};

use crate::models::Entity;

/// Preferred timestamp field
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Fallback timestamp field
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Comparable instant of an entity; 0 when absent or unusable.
pub fn timestamp_of(entity: Option<&Entity>) -> i64 {
    entity.map_or(0, |entity| fields_timestamp(entity.fields()))
}

/// Timestamp of an object's fields: `updatedAt`, else `timestamp`, else 0.
///
/// An `updatedAt` that reads as 0 (null, zero, malformed) falls through to
/// `timestamp`.
pub fn fields_timestamp(fields: &Map<String, Value>) -> i64 {
    fields
        .get(UPDATED_AT_FIELD)
        .map(millis_of)
        .filter(|millis| *millis != 0)
        .or_else(|| fields.get(TIMESTAMP_FIELD).map(millis_of))
        .unwrap_or(0)
}

/// Timestamp of an arbitrary JSON value.
///
/// Objects use their fields; a list (such as a calendar day) takes the newest
/// timestamp among its items.
pub fn value_timestamp(value: &Value) -> i64 {
    match value {
        Value::Object(fields) => fields_timestamp(fields),
        Value::Array(items) => list_timestamp(items),
        _ => 0,
    }
}

/// Newest timestamp of a list of items, 0 when empty.
pub fn list_timestamp(items: &[Value]) -> i64 {
    items.iter().map(value_timestamp).max().unwrap_or(0)
}

/// Normalize one timestamp value to unix milliseconds.
///
/// Integers are taken as-is. A remote timestamp object
/// (`{seconds, nanoseconds}` or `{_seconds, _nanoseconds}`) is converted.
/// Anything else is 0.
pub fn millis_of(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|_| i64::MAX))
            .unwrap_or(0),
        Value::Object(fields) => remote_timestamp_millis(fields).unwrap_or(0),
        _ => 0,
    }
}

/// Normalize an optional server timestamp, treating null as absent.
pub fn server_millis(value: Option<&Value>) -> Option<i64> {
    value.filter(|value| !value.is_null()).map(millis_of)
}

fn remote_timestamp_millis(fields: &Map<String, Value>) -> Option<i64> {
    let seconds = fields
        .get("seconds")
        .or_else(|| fields.get("_seconds"))?
        .as_i64()?;
    let nanos = fields
        .get("nanoseconds")
        .or_else(|| fields.get("_nanoseconds"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Some(seconds.saturating_mul(1000).saturating_add(nanos / 1_000_000))
}
