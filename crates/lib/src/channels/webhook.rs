//! WhatsApp Cloud API webhook: verification handshake and message delivery.
//!
//! Deliveries are not answered directly; the first text message of the envelope is
//! normalized to a bridge frame and fanned out to every open bridge socket.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::gateway::protocol::{encode, WsMessageFrame};
use crate::gateway::GatewayState;

/// Meta verification query (`hub.mode`, `hub.verify_token`, `hub.challenge`).
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub hub_mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub hub_challenge: Option<String>,
}

/// GET /webhook/wa: 200 with the challenge when mode is `subscribe` and the token matches,
/// 403 on mismatch, 400 when mode or token is missing.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(query): Query<WhatsAppVerifyQuery>,
) -> Response {
    let mode = query.hub_mode.as_deref().filter(|m| !m.is_empty());
    let token = query.hub_verify_token.as_deref().filter(|t| !t.is_empty());
    let (Some(mode), Some(token)) = (mode, token) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let expected = state.verify_token.as_deref();
    if mode == "subscribe" && expected == Some(token) {
        log::info!("whatsapp webhook verified");
        (StatusCode::OK, query.hub_challenge.unwrap_or_default()).into_response()
    } else {
        log::warn!("whatsapp webhook verification rejected (mode {})", mode);
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Cloud API webhook body: `entry[].changes[].value.messages[]`.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: Option<WebhookValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub text: Option<WebhookText>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookText {
    #[serde(default)]
    pub body: Option<String>,
}

/// First message of the first change of the first entry, as `(from, body)`, when both are
/// present and non-empty.
pub fn extract_text_message(envelope: &WebhookEnvelope) -> Option<(&str, &str)> {
    let msg = envelope
        .entry
        .first()?
        .changes
        .first()?
        .value
        .as_ref()?
        .messages
        .first()?;
    let from = msg.from.as_deref().filter(|s| !s.is_empty())?;
    let body = msg
        .text
        .as_ref()?
        .body
        .as_deref()
        .filter(|s| !s.is_empty())?;
    Some((from, body))
}

/// POST /webhook/wa: always 200, whether or not a message could be extracted.
pub async fn receive_webhook(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            log::debug!("whatsapp webhook body did not decode: {}", e);
            return StatusCode::OK;
        }
    };
    let Some((from, text)) = extract_text_message(&envelope) else {
        log::debug!("whatsapp webhook without a text message");
        return StatusCode::OK;
    };
    if state.connections.is_empty().await {
        log::info!("whatsapp webhook message from {} dropped: no bridge socket open", from);
        return StatusCode::OK;
    }
    let frame = encode(&WsMessageFrame {
        number: format!("+{}", from),
        text: text.to_string(),
    });
    let delivered = state.connections.broadcast(&frame).await;
    log::info!("whatsapp webhook message fanned out to {} connection(s)", delivered);
    StatusCode::OK
}
