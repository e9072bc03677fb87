//! JSON utility functions

use opentelemetry::Value;
use opentelemetry::logs::AnyValue;
use serde_json::Value as JsonValue;

/// Parse a string as JSON, falling back to the string itself.
///
/// Logs at trace level when falling back.
pub fn parse_json_with_fallback(value: &str, context: &str) -> JsonValue {
    match serde_json::from_str(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::trace!(
                context = context,
                error = %e,
                value_preview = %truncate_for_log(value, 100),
                "JSON parse failed, using string fallback"
            );
            JsonValue::String(value.to_string())
        }
    }
}

/// Truncate a string for logging purposes (UTF-8 safe).
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Serialize to a JSON string, returning `None` for null values or on failure.
pub fn to_json_string<T: serde::Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(JsonValue::Null) => None,
        Ok(json) => Some(json.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize attribute value");
            None
        }
    }
}

/// Convert a JSON value into an attribute value.
///
/// Scalars map one to one; arrays, objects, and null become JSON strings.
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::String(s) => Value::from(s.clone()),
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => Value::F64(n.as_f64().unwrap_or_default()),
        },
        other => Value::from(other.to_string()),
    }
}

/// Convert a JSON value into a log attribute value, same mapping as
/// [`json_to_value`].
pub fn json_to_any_value(json: &JsonValue) -> AnyValue {
    match json {
        JsonValue::String(s) => AnyValue::from(s.clone()),
        JsonValue::Bool(b) => AnyValue::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AnyValue::Int(i),
            None => AnyValue::Double(n.as_f64().unwrap_or_default()),
        },
        other => AnyValue::from(other.to_string()),
    }
}
