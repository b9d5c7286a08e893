//! Canonical JSON and content digests.
//!
//! Fingerprints compare a stable hash of the canonical form instead of raw
//! serialized strings, so key order and whitespace never read as an edit.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::models::Entity;

const DIGEST_PREFIX: &str = "blake3:";

/// `blake3:<hex>` digest of an entity's canonical JSON form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of_value(value: &Value) -> Self {
        Self::of_canonical(&to_canonical_string(value))
    }

    pub fn of_entity(entity: &Entity) -> Self {
        let mut out = String::new();
        write_object(entity.fields(), &mut out);
        Self::of_canonical(&out)
    }

    pub fn of_values(values: &[Value]) -> Self {
        let mut out = String::new();
        write_array(values, &mut out);
        Self::of_canonical(&out)
    }

    fn of_canonical(canonical: &str) -> Self {
        Self(format!(
            "{DIGEST_PREFIX}{}",
            blake3::hash(canonical.as_bytes()).to_hex()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize with sorted object keys and no insignificant whitespace.
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => write_array(items, out),
        Value::Object(map) => write_object(map, out),
    }
}

fn write_array(items: &[Value], out: &mut String) {
    out.push('[');
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        write_canonical(item, out);
    }
    out.push(']');
}

fn write_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (idx, key) in keys.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(key.as_str()).to_string());
        out.push(':');
        write_canonical(&map[*key], out);
    }
    out.push('}');
}
