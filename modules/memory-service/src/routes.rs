//! Axum route handlers for the memory RPC API.

use crate::error::StorageError;
use crate::manager::MemoryManager;
use crate::store::utc_now;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use memory_types::*;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub manager: Arc<MemoryManager>,
    pub start_time: Instant,
}

type RpcResult<T> = (StatusCode, Json<RpcResponse<T>>);

/// Malformed request payloads, rejected before they reach the manager.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),
    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

fn invalid<T: serde::Serialize>(e: ValidationError) -> RpcResult<T> {
    log::warn!("[MEMORY] Rejected request: {}", e);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(RpcResponse::err(e.to_string(), utc_now())),
    )
}

fn storage_failure<T: serde::Serialize>(e: StorageError) -> RpcResult<T> {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(RpcResponse::err(e.to_string(), utc_now())),
    )
}

// GET /
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "operational".to_string(),
        service: "memory-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// GET /api/memory
pub async fn get_memory(State(state): State<Arc<AppState>>) -> RpcResult<Document> {
    match state.manager.get_document().await {
        Ok(doc) => (StatusCode::OK, Json(RpcResponse::ok(doc, utc_now()))),
        Err(e) => storage_failure(e),
    }
}

// POST /api/memory
pub async fn update_memory(
    State(state): State<Arc<AppState>>,
    req: Result<Json<MemoryUpdateRequest>, JsonRejection>,
) -> RpcResult<Document> {
    let req = match req.map_err(ValidationError::from) {
        Ok(Json(req)) => req,
        Err(e) => return invalid(e),
    };
    if let Err(e) = require(&req.source, "source") {
        return invalid(e);
    }

    match state.manager.apply_update(&req.updates, &req.source).await {
        Ok(doc) => (
            StatusCode::OK,
            Json(RpcResponse::ok(doc, utc_now()).with_message("Memory updated successfully")),
        ),
        Err(e) => storage_failure(e),
    }
}

// POST /api/memory/events
pub async fn log_event(
    State(state): State<Arc<AppState>>,
    req: Result<Json<MemoryEvent>, JsonRejection>,
) -> RpcResult<Document> {
    let event = match req.map_err(ValidationError::from) {
        Ok(Json(event)) => event,
        Err(e) => return invalid(e),
    };
    if let Err(e) = require(&event.event_type, "event_type").and(require(&event.source, "source")) {
        return invalid(e);
    }

    match state.manager.apply_event(&event).await {
        Ok(doc) => {
            let msg = format!("Event '{}' processed", event.event_type);
            (StatusCode::OK, Json(RpcResponse::ok(doc, utc_now()).with_message(msg)))
        }
        Err(e) => storage_failure(e),
    }
}

// PUT /api/memory/complete-action?action_id=...
pub async fn complete_action(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CompleteActionQuery>, QueryRejection>,
) -> RpcResult<Document> {
    let query = match query.map_err(ValidationError::from) {
        Ok(Query(q)) => q,
        Err(e) => return invalid(e),
    };
    if let Err(e) = require(&query.action_id, "action_id") {
        return invalid(e);
    }

    match state.manager.complete_action(&query.action_id).await {
        Ok(doc) => (
            StatusCode::OK,
            Json(RpcResponse::ok(doc, utc_now()).with_message("Action marked complete")),
        ),
        Err(e) => storage_failure(e),
    }
}

// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> RpcResult<ServiceStatus> {
    (
        StatusCode::OK,
        Json(RpcResponse::ok(
            ServiceStatus {
                running: true,
                uptime_secs: state.start_time.elapsed().as_secs(),
                subscribers: state.manager.subscriber_count(),
                memory_file: state.manager.store().path().display().to_string(),
            },
            utc_now(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("warp", "source").is_ok());
        assert!(matches!(
            require("   ", "source"),
            Err(ValidationError::EmptyField("source"))
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "operational");
        assert_eq!(body.service, "memory-service");
    }
}
