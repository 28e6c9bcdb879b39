//! Shared types for the memory service and its RPC / WebSocket clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =====================================================
// Document
// =====================================================

/// The single shared JSON document. Only the fields below are interpreted by
/// the service; every other key is carried through untouched.
pub type Document = Map<String, Value>;

/// Well-known top-level document keys.
pub mod fields {
    pub const CURRENT_GOAL: &str = "current_goal";
    pub const COMPLETED_COMPONENTS: &str = "completed_components";
    pub const SYSTEM_STATE: &str = "system_state";
    pub const EXISTING_PROJECTS: &str = "existing_projects";
    pub const TOOL_STATUS: &str = "tool_status";
    pub const NEXT_ACTIONS: &str = "next_actions";
    pub const COMPLETED_ACTIONS: &str = "completed_actions";
    pub const UPDATE_HISTORY: &str = "update_history";
    pub const EVENTS: &str = "events";
    pub const LAST_UPDATED: &str = "last_updated";
}

/// Max entries kept in `update_history`
pub const UPDATE_HISTORY_CAP: usize = 50;
/// Max entries kept in `events`
pub const EVENT_LOG_CAP: usize = 100;

// =====================================================
// Log Records
// =====================================================

/// One entry of `update_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub source: String,
    pub fields_updated: Vec<String>,
}

/// One entry of the generic `events` log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub data: Map<String, Value>,
    pub timestamp: String,
}

/// One entry of `completed_actions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAction {
    pub action: String,
    pub completed_at: String,
}

// =====================================================
// RPC Request Types
// =====================================================

/// Body of `POST /api/memory`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUpdateRequest {
    pub updates: Map<String, Value>,
    pub source: String,
}

/// Body of `POST /api/memory/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub event_type: String,
    pub source: String,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Query of `PUT /api/memory/complete-action`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteActionQuery {
    pub action_id: String,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T, timestamp: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            timestamp: timestamp.into(),
        }
    }

    pub fn err(msg: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(msg.into()),
            timestamp: timestamp.into(),
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

// =====================================================
// Push Notifications
// =====================================================

/// Messages pushed to WebSocket subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Sent once, right after subscribing
    InitialState { data: Document, timestamp: String },
    MemoryUpdate {
        data: Document,
        source: String,
        timestamp: String,
    },
    MemoryEvent {
        event: MemoryEvent,
        data: Document,
        timestamp: String,
    },
    ActionCompleted {
        action_id: String,
        data: Document,
        timestamp: String,
    },
    /// Echo of a message received from the subscriber
    Ack { received: Value },
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamMessage::InitialState { .. } => "initial_state",
            StreamMessage::MemoryUpdate { .. } => "memory_update",
            StreamMessage::MemoryEvent { .. } => "memory_event",
            StreamMessage::ActionCompleted { .. } => "action_completed",
            StreamMessage::Ack { .. } => "ack",
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub subscribers: usize,
    pub memory_file: String,
}
