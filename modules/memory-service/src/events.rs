//! Event classification and the per-kind document mutations.

use crate::document::{append_capped, array_entry, object_entry, to_value};
use memory_types::{fields, Document, EventRecord, EVENT_LOG_CAP};
use serde_json::{Map, Value};

/// What an incoming event type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `agent_created`, `workflow_created`
    Agent,
    /// `project_created`, `project_completed`
    Project,
    /// `tool_added`, `tool_status_change`
    Tool,
    /// `component_completed`
    Component,
    /// Anything else goes to the bounded `events` log
    Generic,
}

impl EventKind {
    pub fn classify(event_type: &str) -> Self {
        match event_type {
            "agent_created" | "workflow_created" => EventKind::Agent,
            "project_created" | "project_completed" => EventKind::Project,
            "tool_added" | "tool_status_change" => EventKind::Tool,
            "component_completed" => EventKind::Component,
            _ => EventKind::Generic,
        }
    }
}

/// Route an event to its handler and return the updated document.
pub fn classify_and_apply(
    mut doc: Document,
    event_type: &str,
    data: &Map<String, Value>,
    source: &str,
    now: &str,
) -> Document {
    let kind = EventKind::classify(event_type);
    log::debug!("[MEMORY] Event '{}' from {} classified as {:?}", event_type, source, kind);

    match kind {
        EventKind::Agent => handle_agent(&mut doc, data, source),
        EventKind::Project => handle_project(&mut doc, data),
        EventKind::Tool => handle_tool(&mut doc, data),
        EventKind::Component => handle_component(&mut doc, data),
        EventKind::Generic => {
            let record = EventRecord {
                event_type: event_type.to_string(),
                source: source.to_string(),
                data: data.clone(),
                timestamp: now.to_string(),
            };
            append_capped(&mut doc, fields::EVENTS, to_value(&record), EVENT_LOG_CAP);
        }
    }
    doc
}

fn handle_agent(doc: &mut Document, data: &Map<String, Value>, source: &str) {
    let Some(name) = first_name(data, &["name", "agent_name"]) else {
        log::warn!("[MEMORY] Agent event from {} has no name, ignoring", source);
        return;
    };

    let system_state = object_entry(doc, fields::SYSTEM_STATE);
    let projects = array_entry(system_state, fields::EXISTING_PROJECTS);

    let already_listed = projects
        .iter()
        .filter_map(Value::as_str)
        .any(|entry| entry.contains(name.as_str()));
    if already_listed {
        return;
    }

    let description = match data.get("description") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => format!("{} via {}", name, source),
        Some(other) => other.to_string(),
    };
    projects.push(Value::String(format!("{} - {}", name, description)));
}

fn handle_project(doc: &mut Document, data: &Map<String, Value>) {
    let completed = data.get("completed").is_some_and(is_truthy);
    if !completed {
        return;
    }
    let Some(name) = first_name(data, &["name", "title"]) else {
        log::warn!("[MEMORY] Completed project event has no name or title, ignoring");
        return;
    };
    push_unique(array_entry(doc, fields::COMPLETED_COMPONENTS), name);
}

fn handle_tool(doc: &mut Document, data: &Map<String, Value>) {
    let Some(tool_name) = first_name(data, &["tool_name"]) else {
        log::warn!("[MEMORY] Tool event has no tool_name, ignoring");
        return;
    };
    let status = data.get("status").cloned().unwrap_or(Value::Null);
    object_entry(doc, fields::TOOL_STATUS).insert(tool_name, status);
}

fn handle_component(doc: &mut Document, data: &Map<String, Value>) {
    let completed = array_entry(doc, fields::COMPLETED_COMPONENTS);
    if let Some(component) = first_name(data, &["component"]) {
        push_unique(completed, component);
    }
}

/// First non-empty string among `keys`.
fn first_name(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| data.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn push_unique(list: &mut Vec<Value>, item: String) {
    if !list.iter().any(|v| v.as_str() == Some(item.as_str())) {
        list.push(Value::String(item));
    }
}
