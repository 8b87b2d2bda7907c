//! Message lifecycle events, pushed best-effort onto a Redis list.
//!
//! Emitting never blocks the caller. A single writer task owns the Redis connection so events
//! land in emit order; when the store is unreachable the task retries every
//! [`RECONNECT_INTERVAL`] and events emitted in the meantime are dropped, not buffered.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::EventsConfig;

pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// A write with no answer within this window counts as a dead connection.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);
const QUEUE_CAPACITY: usize = 256;

/// Lifecycle stage of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "message_received")]
    Received,
    #[serde(rename = "message_processed")]
    Processed,
}

/// One log entry; serialized as `{"number","timestamp","event"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    #[serde(rename = "number")]
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "event")]
    pub kind: EventKind,
}

impl LogEvent {
    pub fn new(sender: impl Into<String>, kind: EventKind) -> Self {
        Self {
            sender: sender.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Append-only, fire-and-forget event destination.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Redis-backed sink (LPUSH of JSON strings onto one list).
pub struct RedisEventLog {
    tx: mpsc::Sender<LogEvent>,
    connected: Arc<AtomicBool>,
}

impl RedisEventLog {
    /// Start the writer task. Fails only if the Redis URL is malformed; an unreachable server
    /// is retried in the background.
    pub fn spawn(config: &EventsConfig) -> anyhow::Result<(Arc<Self>, JoinHandle<()>)> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| anyhow::anyhow!("invalid event log url {}: {}", config.redis_url, e))?;
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_writer(
            client,
            config.key.clone(),
            rx,
            connected.clone(),
        ));
        Ok((Arc::new(Self { tx, connected }), handle))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl EventSink for RedisEventLog {
    fn emit(&self, event: LogEvent) {
        if !self.is_connected() {
            log::debug!("event log disconnected, dropping {:?} event", event.kind);
            return;
        }
        if let Err(e) = self.tx.try_send(event) {
            log::warn!("event log queue unavailable, dropping event: {}", e);
        }
    }
}

/// Connect, drain events while the connection holds, reconnect on a fixed interval.
async fn run_writer(
    client: redis::Client,
    key: String,
    mut rx: mpsc::Receiver<LogEvent>,
    connected: Arc<AtomicBool>,
) {
    let conn_config = redis::AsyncConnectionConfig::new()
        .set_connection_timeout(CONNECT_TIMEOUT)
        .set_response_timeout(RESPONSE_TIMEOUT);
    loop {
        match client
            .get_multiplexed_async_connection_with_config(&conn_config)
            .await
        {
            Ok(mut conn) => {
                connected.store(true, Ordering::SeqCst);
                log::info!("event log connected");
                let mut closed = true;
                while let Some(event) = rx.recv().await {
                    let payload = match serde_json::to_string(&event) {
                        Ok(p) => p,
                        Err(e) => {
                            log::warn!("event log: encoding event failed: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = conn.lpush::<_, _, ()>(&key, payload).await {
                        log::warn!("event log write failed, reconnecting: {}", e);
                        closed = false;
                        break;
                    }
                }
                connected.store(false, Ordering::SeqCst);
                if closed {
                    log::debug!("event log: all senders dropped, writer exiting");
                    return;
                }
                // Anything queued while the write was failing is dropped.
                while rx.try_recv().is_ok() {}
            }
            Err(e) => {
                log::warn!("event log connect failed: {}", e);
            }
        }
        tokio::time::sleep(RECONNECT_INTERVAL).await;
    }
}
