//! Communication channels: WhatsApp bridge socket, WhatsApp Cloud webhook, browser widget socket.
//!
//! Each adapter turns its transport envelope into a [`CanonicalMessage`], hands it to the
//! responder chain, and writes the reply back in its own envelope. Open bridge sockets are
//! tracked in a [`ConnectionRegistry`] so webhook deliveries can be fanned out to them.

mod browser;
mod inbound;
mod registry;
mod webhook;
mod websocket;
mod whatsapp;

pub use browser::browser_socket_handler;
pub use inbound::{CanonicalMessage, ChannelTag, Reply};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use webhook::{extract_text_message, receive_webhook, verify_webhook, WebhookEnvelope};
pub use websocket::{process_inbound_message, ws_handler};
pub use whatsapp::{send_whatsapp, SendError, WhatsAppClient};
