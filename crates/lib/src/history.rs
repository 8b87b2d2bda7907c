//! Message history: a single JSON array of records on disk, rewritten in full on each append.
//!
//! Appends are read-modify-write under an async mutex so concurrent messages from different
//! connections cannot lose each other's records. A missing or corrupt file reads as empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::channels::CanonicalMessage;

/// One persisted exchange. Field names match the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "number")]
    pub sender: String,
    pub start_time: DateTime<Utc>,
    /// Raw payloads received in this exchange.
    pub messages: Vec<serde_json::Value>,
    #[serde(rename = "ip")]
    pub origin_ip: String,
}

impl HistoryRecord {
    pub fn from_message(msg: &CanonicalMessage, origin_ip: impl Into<String>) -> Self {
        Self {
            sender: msg.sender.clone(),
            start_time: msg.received_at,
            messages: vec![msg.raw_payload.clone()],
            origin_ip: origin_ip.into(),
        }
    }
}

/// File-backed append-only history.
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all entries; read or parse failures yield an empty list. Entries stay as raw JSON
    /// so records written by older gateways survive the rewrite untouched.
    async fn load(&self) -> Vec<serde_json::Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::warn!("history: reading {} failed: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "history: {} is not a JSON array, starting over: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Append one record and persist the whole sequence (temp file + rename).
    pub async fn append(&self, record: HistoryRecord) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await;
        let entry = serde_json::to_value(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        records.push(entry);
        let json = serde_json::to_vec(&records)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    /// Number of persisted records (0 if the file is missing or unreadable).
    pub async fn count(&self) -> usize {
        let _guard = self.lock.lock().await;
        self.load().await.len()
    }
}
