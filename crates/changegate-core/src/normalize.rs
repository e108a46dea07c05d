//! Field-shape adapter for data entering the pipeline.
//!
//! The change-management API and the webhook sender both deliver fields in
//! more than one shape: plain strings, `{value, display_value}` reference
//! objects, and booleans spelled as `"true"`/`"false"`. Everything that enters
//! the core goes through this module so the rest of the code sees one shape.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

const REFERENCE_KEYS: [&str; 3] = ["value", "display_value", "link"];

fn is_reference(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && (map.contains_key("value") || map.contains_key("display_value"))
        && map.keys().all(|k| REFERENCE_KEYS.contains(&k.as_str()))
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Collapse one field to its canonical shape.
///
/// References become their display label (falling back to the raw value),
/// `"true"`/`"false"` become booleans, and nested objects and arrays are
/// normalized recursively.
pub fn normalize_reference(value: &Value) -> Value {
    match value {
        Value::Object(map) if is_reference(map) => {
            let label = non_empty(map.get("display_value"))
                .or_else(|| non_empty(map.get("value")))
                .unwrap_or_default();
            normalize_scalar(label)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_reference(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(normalize_reference).collect()),
        Value::String(s) => normalize_scalar(s),
        other => other.clone(),
    }
}

fn normalize_scalar(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else {
        Value::String(trimmed.to_string())
    }
}

/// Normalize every field of a record. Non-objects yield an empty map.
pub fn normalize_record(record: &Value) -> BTreeMap<String, Value> {
    match record {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), normalize_reference(v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Raw machine value of a field: the `value` half of a reference, or the
/// string itself. Used for ids and timestamps, where display labels are
/// localized.
pub fn raw_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => non_empty(map.get("value"))
            .or_else(|| non_empty(map.get("sys_id")))
            .map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Human-readable text of a field: display label for references, the string
/// itself otherwise.
pub fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => non_empty(map.get("display_value"))
            .or_else(|| non_empty(map.get("value")))
            .map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-empty text of a normalized field.
pub fn text(record: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(display_text)
}

/// Whether a normalized field is present and non-empty. A `false` boolean
/// counts as absent.
pub fn present(record: &BTreeMap<String, Value>, key: &str) -> bool {
    match record.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(value) => display_text(value).is_some(),
        None => false,
    }
}

/// Boolean reading of a normalized field. Absent or unrecognised is `None`.
pub fn flag(record: &BTreeMap<String, Value>, key: &str) -> Option<bool> {
    match record.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "yes" | "y" => Some(true),
            "0" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_collapses_to_display_label() {
        let field = json!({"value": "6816f79c", "display_value": "Network Ops", "link": "https://x"});
        assert_eq!(normalize_reference(&field), json!("Network Ops"));
        assert_eq!(raw_value(&field).as_deref(), Some("6816f79c"));
    }

    #[test]
    fn empty_display_falls_back_to_value() {
        let field = json!({"value": "abc", "display_value": ""});
        assert_eq!(normalize_reference(&field), json!("abc"));
    }

    #[test]
    fn boolean_strings_become_booleans() {
        assert_eq!(normalize_reference(&json!("true")), json!(true));
        assert_eq!(normalize_reference(&json!({"value": "false", "display_value": "false"})), json!(false));
        assert_eq!(normalize_reference(&json!(" TRUE ")), json!(true));
        assert_eq!(normalize_reference(&json!("truthy")), json!("truthy"));
    }

    #[test]
    fn compound_objects_are_normalized_recursively() {
        let record = json!({
            "active": {"value": "true", "display_value": "true"},
            "vars": [{"mandatory": "false"}],
            "meta": {"owner": {"value": "u1", "display_value": "Ana"}, "extra": 1}
        });
        let normalized = normalize_record(&record);
        assert_eq!(normalized["active"], json!(true));
        assert_eq!(normalized["vars"], json!([{"mandatory": false}]));
        assert_eq!(normalized["meta"], json!({"owner": "Ana", "extra": 1}));
    }

    #[test]
    fn text_and_flag_helpers() {
        let record = normalize_record(&json!({"name": "  ", "active": "1", "title": "x"}));
        assert!(!present(&record, "name"));
        assert_eq!(flag(&record, "active"), Some(true));
        assert_eq!(flag(&record, "missing"), None);
        assert_eq!(text(&record, "title").as_deref(), Some("x"));
    }
}
