//! Bounding and normalizing of untrusted event input.
//!
//! Everything that arrives at `POST /api/events` passes through here before
//! it is enriched and handed to providers:
//! - event names must match `^[A-Za-z0-9_]{1,50}$`
//! - property bags are depth-, width- and length-bounded
//! - property keys are rewritten to `[A-Za-z0-9_]`

use serde_json::{Map, Value};

use crate::error::SanitizeError;

pub const MAX_EVENT_NAME_LEN: usize = 50;
pub const MAX_DEPTH: usize = 3;
pub const MAX_PROPERTIES: usize = 20;
pub const MAX_ARRAY_ITEMS: usize = 10;
pub const MAX_STRING_LEN: usize = 500;
pub const MAX_KEY_LEN: usize = 50;

/// Replacement for any value found at or below [`MAX_DEPTH`].
pub const TOO_DEEP_SENTINEL: &str = "[Object too deep]";

const TRUNCATION_MARKER: &str = "...";

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` when `name` is 1–50 ASCII alphanumerics or underscores.
pub fn validate_event_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_EVENT_NAME_LEN && name.chars().all(is_name_char)
}

/// Sanitize a property bag.
///
/// `null` is treated as an empty bag. Any other non-object input is an error,
/// which callers report as "too complex".
pub fn sanitize_properties(properties: &Value) -> Result<Map<String, Value>, SanitizeError> {
    match properties {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(sanitize_object(map, 0)),
        other => Err(SanitizeError::NotAnObject(json_type_name(other))),
    }
}

fn sanitize_value(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(TOO_DEEP_SENTINEL.to_string());
    }
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => Value::String(truncate_string(s)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(|item| sanitize_value(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(sanitize_object(map, depth)),
    }
}

fn sanitize_object(map: &Map<String, Value>, depth: usize) -> Map<String, Value> {
    let mut out = Map::new();
    // Counts accepted keys, so two keys that rewrite to the same name both
    // use up the budget.
    let mut accepted = 0;
    for (key, value) in map {
        if accepted >= MAX_PROPERTIES {
            break;
        }
        let key = sanitize_key(key);
        if key.is_empty() {
            continue;
        }
        out.insert(key, sanitize_value(value, depth + 1));
        accepted += 1;
    }
    out
}

/// Rewrite every char outside `[A-Za-z0-9_]` to `_` and cut to 50 chars.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .take(MAX_KEY_LEN)
        .collect()
}

/// Cut strings longer than [`MAX_STRING_LEN`] chars, keeping the result
/// (marker included) within the limit.
fn truncate_string(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_LEN {
        return s.to_string();
    }
    let keep = MAX_STRING_LEN - TRUNCATION_MARKER.len();
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
