//! Deep merge of partial updates into the memory document.

use memory_types::Document;
use serde_json::Value;
use std::collections::HashSet;

/// Merge `updates` into `base` and return the result.
///
/// - object + object: merged key by key, recursively
/// - array + array: base items followed by update items, then [`dedup_values`]
/// - anything else: the update value replaces the base value
pub fn deep_merge(mut base: Document, updates: &Document) -> Document {
    for (key, update) in updates {
        let merged = match (base.remove(key), update) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(deep_merge(existing, incoming))
            }
            (Some(Value::Array(mut existing)), Value::Array(incoming)) => {
                existing.extend(incoming.iter().cloned());
                Value::Array(dedup_values(existing))
            }
            _ => update.clone(),
        };
        base.insert(key.clone(), merged);
    }
    base
}

/// Drop later duplicates, keeping the first occurrence of each item in place.
pub fn dedup_values(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(dedup_key(item)))
        .collect()
}

/// Identity used for deduplication. Objects and arrays compare by their
/// serialized form with keys in sorted order; scalars compare by their string
/// form, so `"1"` and `1` collide.
fn dedup_key(item: &Value) -> String {
    match item {
        // serde_json's default Map is ordered by key, so this is canonical.
        Value::Object(_) | Value::Array(_) => item.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let items = vec![json!("a"), json!("b"), json!("a"), json!("c"), json!("b")];
        assert_eq!(dedup_values(items), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_dedup_composites_ignore_key_order() {
        let first = serde_json::from_str::<Value>(r#"{"a": 1, "b": [1, 2]}"#).unwrap();
        let second = serde_json::from_str::<Value>(r#"{"b": [1, 2], "a": 1}"#).unwrap();
        let deduped = dedup_values(vec![first.clone(), second, json!([1, 2])]);
        assert_eq!(deduped, vec![first, json!([1, 2])]);
    }

    #[test]
    fn test_dedup_scalars_by_string_form() {
        let deduped = dedup_values(vec![json!(1), json!("1"), json!(true), json!("true"), json!(null)]);
        assert_eq!(deduped, vec![json!(1), json!(true), json!(null)]);
    }

    #[test]
    fn test_nested_objects_merge_key_wise() {
        let base = doc(json!({
            "system_state": {"existing_projects": ["a"], "region": "eu"},
            "current_goal": "old"
        }));
        let updates = doc(json!({
            "system_state": {"existing_projects": ["b", "a"], "owner": "ops"},
            "current_goal": "new"
        }));

        let merged = deep_merge(base, &updates);
        assert_eq!(
            Value::Object(merged),
            json!({
                "system_state": {"existing_projects": ["a", "b"], "region": "eu", "owner": "ops"},
                "current_goal": "new"
            })
        );
    }

    #[test]
    fn test_type_change_replaces_value() {
        let base = doc(json!({"tool_status": {"git": "ok"}, "next_actions": ["x"]}));
        let updates = doc(json!({"tool_status": ["git"], "next_actions": {"x": true}}));

        let merged = deep_merge(base, &updates);
        assert_eq!(merged["tool_status"], json!(["git"]));
        assert_eq!(merged["next_actions"], json!({"x": true}));
    }

    #[test]
    fn test_list_merge_is_idempotent() {
        let base = doc(json!({"completed_components": ["X", "Z"], "meta": {"tags": ["a", "a"]}}));
        let updates = doc(json!({"completed_components": ["X", "Y"], "meta": {"tags": ["b"]}}));

        let once = deep_merge(base, &updates);
        let twice = deep_merge(once.clone(), &updates);
        assert_eq!(once, twice);
        assert_eq!(twice["completed_components"], json!(["X", "Z", "Y"]));
        assert_eq!(twice["meta"]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_merge_does_not_alias_updates() {
        let base = doc(json!({"nested": {"a": 1}}));
        let mut updates = doc(json!({"nested": {"b": 2}, "list": [1]}));

        let merged = deep_merge(base, &updates);
        updates.insert("list".to_string(), json!([99]));
        updates["nested"]["b"] = json!(42);

        assert_eq!(merged["nested"], json!({"a": 1, "b": 2}));
        assert_eq!(merged["list"], json!([1]));
    }
}
