//! Browser widget socket (`GET /socket`).
//!
//! Talks to the orchestrator only, with channel tag `web` and this connection's session
//! token. The connection id stands in as the sender.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};

use crate::channels::{CanonicalMessage, ChannelTag};
use crate::gateway::protocol::{encode, BrowserEvent};
use crate::gateway::GatewayState;
use crate::session::Session;

pub async fn browser_socket_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let mut session = Session::new();
    log::info!("browser client connected ({})", conn_id);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Ok(event) = serde_json::from_str::<BrowserEvent>(&text) else {
                    log::debug!("browser: ignoring non-event frame");
                    continue;
                };
                let Some(user_text) = event.message_text() else {
                    continue;
                };
                let msg = CanonicalMessage::new(
                    ChannelTag::Web,
                    conn_id.clone(),
                    user_text,
                    event.data.clone(),
                );
                let reply = state.chain.resolve_direct(&msg, &mut session).await;
                let out = encode(&BrowserEvent::bot_message(reply.text));
                if socket.send(Message::Text(out)).await.is_err() {
                    break;
                }
            }
        }
    }

    session.reset();
    log::info!("browser client disconnected ({})", conn_id);
}
