//! Metadata (de)serialization across the provider boundary
//!
//! The provider only preserves string-valued metadata entries, so the
//! structured `langsmith` sub-object is flattened to a JSON string before
//! submission and inflated again on the way back. Strings that fail to
//! parse are preserved untouched.

use serde_json::{Map, Value};

/// Key holding structured trace context inside request metadata.
pub const LANGSMITH_KEY: &str = "langsmith";

/// Copy `metadata`, serializing the `langsmith` entry to a JSON string
/// when it is an object or array.
#[must_use]
pub fn serialize_for_provider(metadata: Option<&Value>) -> Option<Value> {
    let object = metadata?.as_object()?;
    let mut copy = object.clone();
    if let Some(langsmith) = copy.get(LANGSMITH_KEY) {
        if langsmith.is_object() || langsmith.is_array() {
            let serialized = langsmith.to_string();
            copy.insert(LANGSMITH_KEY.to_string(), Value::String(serialized));
        }
    }
    Some(Value::Object(copy))
}

/// Copy `metadata`, deserializing a string-valued `langsmith` entry back
/// into structured JSON. Non-object input yields an empty map.
#[must_use]
pub fn deserialize_from_provider(metadata: Option<&Value>) -> Map<String, Value> {
    let Some(object) = metadata.and_then(Value::as_object) else {
        return Map::new();
    };
    let mut copy = object.clone();
    if let Some(Value::String(raw)) = copy.get(LANGSMITH_KEY) {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            copy.insert(LANGSMITH_KEY.to_string(), parsed);
        }
    }
    copy
}
