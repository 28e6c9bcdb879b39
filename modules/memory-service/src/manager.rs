//! The memory operations exposed to request handlers.
//!
//! Every mutation is one cycle under the store lock: read, compute, persist,
//! then queue the change notification. The notification is queued before the
//! lock is released, so subscribers see changes in write order.

use crate::broadcaster::ChangeBroadcaster;
use crate::document::{append_capped, to_value, truncate_oldest};
use crate::error::StorageError;
use crate::events;
use crate::ledger;
use crate::merge;
use crate::store::{utc_now, DocumentStore, StoreSession};
use memory_types::{
    fields, Document, HistoryEntry, MemoryEvent, StreamMessage, EVENT_LOG_CAP, UPDATE_HISTORY_CAP,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct MemoryManager {
    store: DocumentStore,
    broadcaster: Arc<ChangeBroadcaster>,
    completed_actions_cap: Option<usize>,
}

impl MemoryManager {
    pub fn new(
        store: DocumentStore,
        broadcaster: Arc<ChangeBroadcaster>,
        completed_actions_cap: Option<usize>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            completed_actions_cap,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.client_count()
    }

    /// Current document, or the default one if nothing was persisted yet.
    pub async fn get_document(&self) -> Result<Document, StorageError> {
        self.store.read().await
    }

    /// Deep-merge `updates` into the document and record the update in
    /// `update_history`. Bounded logs stay bounded even when `updates`
    /// supplies entries for them directly.
    pub async fn apply_update(
        &self,
        updates: &Map<String, Value>,
        source: &str,
    ) -> Result<Document, StorageError> {
        let session = self.store.lock().await;
        let doc = session.read().await?;

        let now = utc_now();
        let mut doc = merge::deep_merge(doc, updates);
        truncate_oldest(&mut doc, fields::EVENTS, EVENT_LOG_CAP);
        if let Some(cap) = self.completed_actions_cap {
            truncate_oldest(&mut doc, fields::COMPLETED_ACTIONS, cap);
        }
        let entry = HistoryEntry {
            timestamp: now.clone(),
            source: source.to_string(),
            fields_updated: updates.keys().cloned().collect(),
        };
        append_capped(&mut doc, fields::UPDATE_HISTORY, to_value(&entry), UPDATE_HISTORY_CAP);

        let doc = self.persist(&session, doc).await?;
        log::debug!(
            "[MEMORY] Update from {} touched {} field(s)",
            source,
            updates.len()
        );
        self.broadcaster.broadcast(StreamMessage::MemoryUpdate {
            data: doc.clone(),
            source: source.to_string(),
            timestamp: now,
        });
        Ok(doc)
    }

    /// Classify `event` and apply it to the document.
    pub async fn apply_event(&self, event: &MemoryEvent) -> Result<Document, StorageError> {
        let session = self.store.lock().await;
        let doc = session.read().await?;

        let now = utc_now();
        let doc = events::classify_and_apply(doc, &event.event_type, &event.data, &event.source, &now);

        let doc = self.persist(&session, doc).await?;
        log::debug!("[MEMORY] Processed event '{}' from {}", event.event_type, event.source);
        self.broadcaster.broadcast(StreamMessage::MemoryEvent {
            event: event.clone(),
            data: doc.clone(),
            timestamp: now,
        });
        Ok(doc)
    }

    /// Mark `action_id` as done.
    pub async fn complete_action(&self, action_id: &str) -> Result<Document, StorageError> {
        let session = self.store.lock().await;
        let doc = session.read().await?;

        let now = utc_now();
        let doc = ledger::complete_action(doc, action_id, &now, self.completed_actions_cap);

        let doc = self.persist(&session, doc).await?;
        log::debug!("[MEMORY] Completed action '{}'", action_id);
        self.broadcaster.broadcast(StreamMessage::ActionCompleted {
            action_id: action_id.to_string(),
            data: doc.clone(),
            timestamp: now,
        });
        Ok(doc)
    }

    /// Register a subscriber. Its first message is the current document.
    pub async fn subscribe(&self) -> Result<(String, mpsc::Receiver<StreamMessage>), StorageError> {
        let session = self.store.lock().await;
        let doc = session.read().await?;
        let subscription = self.broadcaster.subscribe(StreamMessage::InitialState {
            data: doc,
            timestamp: utc_now(),
        });
        drop(session);

        log::info!("[MEMORY] Subscriber {} connected", subscription.0);
        Ok(subscription)
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.broadcaster.unsubscribe(client_id);
        log::info!("[MEMORY] Subscriber {} disconnected", client_id);
    }

    async fn persist(&self, session: &StoreSession<'_>, mut doc: Document) -> Result<Document, StorageError> {
        if let Err(e) = session.write(&mut doc).await {
            log::error!("[MEMORY] Failed to persist document: {}", e);
            return Err(e);
        }
        Ok(doc)
    }
}
