//! WebSocket endpoint for real-time memory sync.
//!
//! A connected client first receives `initial_state`, then every change
//! notification. JSON text it sends back is echoed as an `ack`.

use crate::manager::MemoryManager;
use crate::routes::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use memory_types::StreamMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

// GET /ws/memory
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let manager = state.manager.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

async fn handle_socket(mut socket: WebSocket, manager: Arc<MemoryManager>) {
    let (client_id, mut events_rx) = match manager.subscribe().await {
        Ok(sub) => sub,
        Err(e) => {
            log::error!("[MEMORY] Could not load document for new subscriber: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<StreamMessage>(32);

    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(msg) = events_rx.recv() => msg,
                Some(msg) = reply_rx.recv() => msg,
                else => break,
            };
            let text = match serde_json::to_string(&message) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("[MEMORY] Failed to encode '{}': {}", message.kind(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(text) => match serde_json::from_str(&text) {
                Ok(received) => {
                    if reply_tx.send(StreamMessage::Ack { received }).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::debug!("[MEMORY] Ignoring non-JSON frame from {}: {}", client_id, e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    manager.unsubscribe(&client_id);
    send_task.abort();
}
