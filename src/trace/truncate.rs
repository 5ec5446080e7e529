//! Payload truncation for trace storage.

use serde_json::Value;

/// Character budget per string field
const MAX_FIELD_CHARS: usize = 2000;
/// Element budget per sequence
const MAX_SEQ_ITEMS: usize = 10;

/// Truncate large data for trace storage to avoid bloat. Strings are cut to
/// a fixed character budget, arrays to a fixed element count; objects are
/// truncated recursively.
pub fn truncate_for_trace(value: &Value) -> Value {
    truncate(value, MAX_FIELD_CHARS, MAX_SEQ_ITEMS)
}

fn truncate(value: &Value, max_chars: usize, max_items: usize) -> Value {
    match value {
        Value::String(s) if s.chars().count() > max_chars => {
            let prefix: String = s.chars().take(max_chars).collect();
            Value::String(format!(
                "{prefix}… [truncated, total {} chars]",
                s.chars().count()
            ))
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(max_items)
                .map(|item| truncate(item, max_chars, max_items))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), truncate(v, max_chars, max_items)))
                .collect(),
        ),
        other => other.clone(),
    }
}
