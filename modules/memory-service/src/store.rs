//! On-disk storage for the memory document.
//!
//! One JSON file is the single source of truth. Every read and write goes
//! through the store's mutex; callers that need read-modify-write atomicity
//! take a [`StoreSession`] and keep it for the whole cycle.

use crate::error::StorageError;
use memory_types::{fields, Document};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

/// Current UTC time in the format used for every timestamp in the document.
pub fn utc_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct DocumentStore {
    path: PathBuf,
    default_goal: String,
    lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>, default_goal: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_goal: default_goal.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire exclusive access to the document.
    pub async fn lock(&self) -> StoreSession<'_> {
        StoreSession {
            store: self,
            _guard: self.lock.lock().await,
        }
    }

    pub async fn read(&self) -> Result<Document, StorageError> {
        self.lock().await.read().await
    }

    /// The document served when nothing has been persisted yet.
    pub fn default_document(&self) -> Document {
        let mut system_state = Document::new();
        system_state.insert(fields::EXISTING_PROJECTS.to_string(), json!([]));

        let mut doc = Document::new();
        doc.insert(fields::CURRENT_GOAL.to_string(), json!(self.default_goal));
        doc.insert(fields::COMPLETED_COMPONENTS.to_string(), json!([]));
        doc.insert(fields::SYSTEM_STATE.to_string(), Value::Object(system_state));
        doc.insert(fields::TOOL_STATUS.to_string(), json!({}));
        doc.insert(fields::NEXT_ACTIONS.to_string(), json!([]));
        doc.insert(fields::LAST_UPDATED.to_string(), Value::String(utc_now()));
        doc
    }
}

/// Exclusive access to the document for the lifetime of the session.
pub struct StoreSession<'a> {
    store: &'a DocumentStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreSession<'_> {
    /// Load the document, or the default one if the file does not exist.
    /// Never creates the file.
    pub async fn read(&self) -> Result<Document, StorageError> {
        let path = &self.store.path;
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("[MEMORY] {} not found, serving default document", path.display());
                return Ok(self.store.default_document());
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: path.clone(),
            source: e,
        })?;

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::NotAnObject(path.clone())),
        }
    }

    /// Stamp `last_updated` and persist the document. The content is written
    /// to a sibling temp file and renamed into place, so a failed write never
    /// leaves a truncated document behind.
    pub async fn write(&self, doc: &mut Document) -> Result<(), StorageError> {
        let path = &self.store.path;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        doc.insert(fields::LAST_UPDATED.to_string(), Value::String(utc_now()));
        let content = serde_json::to_string_pretty(doc)?;

        let tmp_path = temp_path(path);
        if let Err(e) = tokio::fs::write(&tmp_path, content).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(&tmp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(path, e));
        }

        log::debug!("[MEMORY] Persisted document to {}", path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "memory.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
