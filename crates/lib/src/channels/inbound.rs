//! Canonical inbound message: what every channel adapter hands to the responder chain.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Channel tag sent to the orchestrator as `context.channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelTag {
    /// WhatsApp bridge socket (and webhook fan-out feeding it).
    Whatsapp,
    /// Browser chat widget.
    Web,
}

/// A message from a channel, normalized. Built once per inbound frame and never mutated.
#[derive(Debug, Clone)]
pub struct CanonicalMessage {
    /// Channel-scoped sender id (phone number, or connection id for the browser widget).
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// The transport frame as received.
    pub raw_payload: serde_json::Value,
    pub channel: ChannelTag,
}

impl CanonicalMessage {
    pub fn new(
        channel: ChannelTag,
        sender: impl Into<String>,
        text: impl Into<String>,
        raw_payload: serde_json::Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            received_at: Utc::now(),
            raw_payload,
            channel,
        }
    }
}

/// Final reply text for one canonical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
