//! Accessors for the loosely typed document tree.

use memory_types::Document;
use serde_json::{Map, Value};

pub fn to_value<T: serde::Serialize>(record: &T) -> Value {
    // Plain structs of strings and maps always serialize.
    serde_json::to_value(record).unwrap_or(Value::Null)
}

/// Get `doc[key]` as an object, replacing any non-object value.
pub fn object_entry<'a>(doc: &'a mut Document, key: &str) -> &'a mut Map<String, Value> {
    let slot = doc
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

/// Get `doc[key]` as an array, replacing any non-array value.
pub fn array_entry<'a>(doc: &'a mut Document, key: &str) -> &'a mut Vec<Value> {
    let slot = doc
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just set to an array"),
    }
}

/// Append to `doc[key]` and keep only the newest `cap` entries.
pub fn append_capped(doc: &mut Document, key: &str, item: Value, cap: usize) {
    array_entry(doc, key).push(item);
    truncate_oldest(doc, key, cap);
}

/// Drop the oldest entries of the list at `doc[key]` until at most `cap`
/// remain. Missing keys and non-list values are left alone.
pub fn truncate_oldest(doc: &mut Document, key: &str, cap: usize) {
    if let Some(Value::Array(items)) = doc.get_mut(key) {
        if items.len() > cap {
            let excess = items.len() - cap;
            items.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_replace_wrong_types() {
        let mut doc = Document::new();
        doc.insert("tool_status".to_string(), json!("broken"));
        doc.insert("events".to_string(), json!({"not": "a list"}));

        object_entry(&mut doc, "tool_status").insert("git".to_string(), json!("ok"));
        array_entry(&mut doc, "events").push(json!(1));

        assert_eq!(doc["tool_status"], json!({"git": "ok"}));
        assert_eq!(doc["events"], json!([1]));
    }

    #[test]
    fn test_append_capped_drops_oldest() {
        let mut doc = Document::new();
        for i in 0..7 {
            append_capped(&mut doc, "log", json!(i), 4);
        }
        assert_eq!(doc["log"], json!([3, 4, 5, 6]));
    }

    #[test]
    fn test_truncate_oldest_leaves_short_and_non_lists() {
        let mut doc = Document::new();
        doc.insert("short".to_string(), json!([1, 2]));
        doc.insert("long".to_string(), json!([1, 2, 3, 4, 5]));
        doc.insert("scalar".to_string(), json!("x"));

        truncate_oldest(&mut doc, "short", 3);
        truncate_oldest(&mut doc, "long", 3);
        truncate_oldest(&mut doc, "scalar", 3);
        truncate_oldest(&mut doc, "missing", 3);

        assert_eq!(doc["short"], json!([1, 2]));
        assert_eq!(doc["long"], json!([3, 4, 5]));
        assert_eq!(doc["scalar"], "x");
        assert!(!doc.contains_key("missing"));
    }
}
