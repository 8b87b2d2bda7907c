//! Gateway: one HTTP port serving the webhook, the outbound send route, health, and both
//! WebSocket adapters (bridge socket at `/ws`, browser socket at `/socket`).

mod auth;
pub mod protocol;
mod server;

pub use auth::{api_key_status, ApiKeyStatus, API_KEY_ERROR, API_KEY_HEADER};
pub use protocol::{BrowserEvent, WsErrorFrame, WsMessageFrame, WsReplyFrame};
pub use server::{router, run_gateway, serve, GatewayState};
