//! Socket wire frames for the bridge socket (`/ws`) and the browser socket (`/socket`).

use serde::{Deserialize, Serialize};

/// Browser event carrying a user message (client -> server).
pub const MESSAGE_EVENT: &str = "message";
/// Browser event carrying a bot reply (server -> client).
pub const BOT_MESSAGE_EVENT: &str = "bot_message";

/// Error text sent on the bridge socket when a frame cannot be processed.
pub const FRAME_ERROR: &str = "Error procesando mensaje";

/// Bridge socket message: `{ "number", "text" }`. Written when a webhook delivery is fanned
/// out; inbound frames are parsed more leniently (see `channels::websocket`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsMessageFrame {
    pub number: String,
    #[serde(default)]
    pub text: String,
}

/// Bridge socket reply: `{ "reply" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsReplyFrame {
    pub reply: String,
}

/// Bridge socket error: `{ "error" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsErrorFrame {
    pub error: String,
}

/// Browser socket event: `{ "event", "data" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BrowserEvent {
    pub fn bot_message(text: impl Into<String>) -> Self {
        Self {
            event: BOT_MESSAGE_EVENT.to_string(),
            data: serde_json::Value::String(text.into()),
        }
    }

    /// The message text when this is a `message` event with a string payload.
    pub fn message_text(&self) -> Option<&str> {
        if self.event == MESSAGE_EVENT {
            self.data.as_str()
        } else {
            None
        }
    }
}

/// Encode a frame; these types always serialize, the fallback is never expected.
pub fn encode<T: Serialize>(frame: &T) -> String {
    serde_json::to_string(frame).unwrap_or_else(|_| r#"{"error":"encoding failed"}"#.to_string())
}
