//! Outstanding (`next_actions`) and completed (`completed_actions`) actions.

use crate::document::{append_capped, array_entry, to_value};
use memory_types::{fields, CompletedAction, Document};
use serde_json::Value;

/// Remove every occurrence of `action_id` from `next_actions` and record its
/// completion. Unknown ids are still recorded.
///
/// With `cap` set, only the newest `cap` completion records are kept.
pub fn complete_action(mut doc: Document, action_id: &str, now: &str, cap: Option<usize>) -> Document {
    if let Some(Value::Array(next)) = doc.get_mut(fields::NEXT_ACTIONS) {
        let before = next.len();
        next.retain(|a| a.as_str() != Some(action_id));
        if next.len() == before {
            log::debug!("[MEMORY] Action '{}' was not in next_actions", action_id);
        }
    }

    let record = to_value(&CompletedAction {
        action: action_id.to_string(),
        completed_at: now.to_string(),
    });
    match cap {
        Some(cap) => append_capped(&mut doc, fields::COMPLETED_ACTIONS, record, cap),
        None => array_entry(&mut doc, fields::COMPLETED_ACTIONS).push(record),
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with_actions(actions: Value) -> Document {
        let mut doc = Document::new();
        doc.insert(fields::NEXT_ACTIONS.to_string(), actions);
        doc
    }

    #[test]
    fn test_removes_all_occurrences_and_records_once() {
        let doc = doc_with_actions(json!(["X", "Y", "X", "Z"]));
        let doc = complete_action(doc, "X", "t1", None);

        assert_eq!(doc[fields::NEXT_ACTIONS], json!(["Y", "Z"]));
        assert_eq!(doc[fields::COMPLETED_ACTIONS], json!([{"action": "X", "completed_at": "t1"}]));
    }

    #[test]
    fn test_unknown_action_still_recorded() {
        let doc = doc_with_actions(json!(["Y"]));
        let doc = complete_action(doc, "X", "t1", None);
        let doc = complete_action(doc, "X", "t2", None);

        assert_eq!(doc[fields::NEXT_ACTIONS], json!(["Y"]));
        assert_eq!(doc[fields::COMPLETED_ACTIONS].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_next_actions_is_not_created() {
        let doc = complete_action(Document::new(), "X", "t1", None);
        assert!(!doc.contains_key(fields::NEXT_ACTIONS));
        assert_eq!(doc[fields::COMPLETED_ACTIONS][0]["action"], "X");
    }

    #[test]
    fn test_cap_drops_oldest_records() {
        let mut doc = Document::new();
        for i in 0..5 {
            doc = complete_action(doc, &format!("a{}", i), "t", Some(3));
        }
        let actions: Vec<_> = doc[fields::COMPLETED_ACTIONS]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["a2", "a3", "a4"]);
    }
}
