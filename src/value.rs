//! Shape helpers for linked-data values
//!
//! Every input field may be absent, a scalar, a typed-value wrapper
//! (`{"@value": ...}`), a single object, or a list. These helpers do the
//! singleton promotion and unwrapping once so normalizers never have to
//! re-check shapes themselves.

use serde_json::{Map, Value};

/// Promote a raw value to a possibly-empty ordered sequence
///
/// - absent / null: empty
/// - list: its non-null elements
/// - anything else: a one-element sequence
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(other) => vec![other],
    }
}

/// Unwrap a typed-value wrapper, returning the inner value
///
/// `{"@value": x, "@type": t}` becomes `x`; other values are returned as-is.
pub fn unwrap_typed(value: &Value) -> &Value {
    match value {
        Value::Object(obj) => obj.get("@value").unwrap_or(value),
        _ => value,
    }
}

/// Get a scalar as text, looking through `@value` and `@id` wrappers
pub fn scalar_text(value: &Value) -> Option<String> {
    match unwrap_typed(value) {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => obj.get("@id").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    }
}

/// Get the text of a field on an object, if present
pub fn field_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_text)
}

/// Collapse a mapped sequence back to the caller-facing shape
///
/// Empty becomes absent, a single element is returned bare, and longer
/// sequences stay lists. A single object and the equivalent one-element
/// list therefore produce identical output.
pub fn collapse(mut items: Vec<Value>) -> Option<Value> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Value::Array(items)),
    }
}

/// Drop entries whose value is null
pub fn strip_nulls(obj: &mut Map<String, Value>) {
    obj.retain(|_, v| !v.is_null());
}

/// Insert a value only when it is present
pub fn insert_some(obj: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        if !v.is_null() {
            obj.insert(key.to_string(), v);
        }
    }
}
