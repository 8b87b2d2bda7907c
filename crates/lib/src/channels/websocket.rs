//! Bridge socket adapter (`GET /ws`).
//!
//! Frames on one connection are handled strictly in order: the next frame is not read until
//! the reply for the previous one has been written. Webhook fan-out frames queued for this
//! connection are written between exchanges.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::channels::{CanonicalMessage, ChannelTag, Reply};
use crate::events::{EventKind, LogEvent};
use crate::gateway::protocol::{
    encode, WsErrorFrame, WsReplyFrame, FRAME_ERROR,
};
use crate::gateway::GatewayState;
use crate::history::HistoryRecord;
use crate::session::Session;

/// GET /ws upgrades to the bridge socket. Client identity is the peer IP.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let client_ip = addr.ip().to_canonical().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_ip))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState, client_ip: String) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<String>();
    state
        .connections
        .register(conn_id.clone(), outbox_tx)
        .await;
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let mut session = Session::new();
    log::info!("ws client connected from {} ({})", client_ip, conn_id);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            Some(frame) = outbox_rx.recv() => {
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let out = handle_frame(&state, &client_ip, &mut session, &text).await;
                if socket.send(Message::Text(out)).await.is_err() {
                    break;
                }
            }
        }
    }

    session.reset();
    state.connections.unregister(&conn_id).await;
    log::info!("ws client disconnected ({})", conn_id);
}

/// One inbound frame to one outbound frame: `{reply}` on success, `{error}` if unparseable.
async fn handle_frame(
    state: &GatewayState,
    client_ip: &str,
    session: &mut Session,
    text: &str,
) -> String {
    let msg = match parse_frame(text) {
        Ok(msg) => msg,
        Err(e) => {
            log::debug!("ws: rejecting frame: {}", e);
            return encode(&WsErrorFrame {
                error: FRAME_ERROR.to_string(),
            });
        }
    };
    let reply = process_inbound_message(state, &msg, client_ip, session).await;
    encode(&WsReplyFrame { reply: reply.text })
}

#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a json object")]
    NotObject,
    #[error("frame has no string or integer number")]
    Number,
    #[error("frame text is not a string")]
    Text,
}

/// Parse a bridge frame into a canonical message; the whole JSON object is kept as raw payload.
/// `number` may be a string or an integer; `text` is optional.
fn parse_frame(text: &str) -> Result<CanonicalMessage, FrameError> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    let obj = raw.as_object().ok_or(FrameError::NotObject)?;
    let number = match obj.get("number") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return Err(FrameError::Number),
    };
    let body = match obj.get("text") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(_) => return Err(FrameError::Text),
    };
    Ok(CanonicalMessage::new(ChannelTag::Whatsapp, number, body, raw))
}

/// Record, notify and resolve one message: history append, `received` event, complaint
/// check, responder chain, `processed` event. Persistence and remote failures are logged and
/// never prevent a reply.
pub async fn process_inbound_message(
    state: &GatewayState,
    msg: &CanonicalMessage,
    origin_ip: &str,
    session: &mut Session,
) -> Reply {
    if let Err(e) = state
        .history
        .append(HistoryRecord::from_message(msg, origin_ip))
        .await
    {
        log::warn!("history append failed: {}", e);
    }
    state
        .events
        .emit(LogEvent::new(&msg.sender, EventKind::Received));

    if state.complaints.check(msg) {
        log::info!("complaint keyword matched for {}", msg.sender);
    }

    let reply = state.chain.resolve(msg, session).await;

    state
        .events
        .emit(LogEvent::new(&msg.sender, EventKind::Processed));
    reply
}
