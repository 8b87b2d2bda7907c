//! Registry of open bridge-socket connections, used for webhook fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Opaque per-connection id.
pub type ConnectionId = String;

/// Process-wide set of connection outboxes. Added on connect, removed on disconnect,
/// iterated read-only on broadcast.
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: ConnectionId, outbox: mpsc::UnboundedSender<String>) {
        self.inner.write().await.insert(id, outbox);
    }

    pub async fn unregister(&self, id: &str) {
        self.inner.write().await.remove(id);
    }

    /// Queue one text frame for every registered connection. Returns how many accepted it.
    pub async fn broadcast(&self, frame: &str) -> usize {
        let g = self.inner.read().await;
        g.values()
            .filter(|outbox| outbox.send(frame.to_string()).is_ok())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
