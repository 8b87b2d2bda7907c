//! WhatsApp Cloud API outbound: send a text message via the Graph API.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::gateway::GatewayState;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Faltan credenciales de WhatsApp Cloud API")]
    MissingCredentials,
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp api error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct GraphSendResponse {
    #[serde(default)]
    messages: Vec<GraphMessageId>,
}

#[derive(Debug, Deserialize)]
struct GraphMessageId {
    id: String,
}

/// Cloud API client bound to one sender phone number id.
#[derive(Clone)]
pub struct WhatsAppClient {
    api_base: String,
    phone_number_id: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(
        api_base: impl Into<String>,
        phone_number_id: Option<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            phone_number_id,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// POST {api_base}/{phone_number_id}/messages. Returns the Graph message id when reported.
    pub async fn send_text(&self, phone_number: &str, text: &str) -> Result<Option<String>, SendError> {
        let (Some(phone_id), Some(token)) = (&self.phone_number_id, &self.access_token) else {
            return Err(SendError::MissingCredentials);
        };
        let url = format!("{}/{}/messages", self.api_base, phone_id);
        let body = json!({
            "messaging_product": "whatsapp",
            "to": digits_only(phone_number),
            "type": "text",
            "text": { "body": text }
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Api(format!("{} {}", status, body)));
        }
        let data: GraphSendResponse = res.json().await?;
        Ok(data.messages.into_iter().next().map(|m| m.id))
    }
}

/// The Graph API wants bare digits (e.g. `56998765432`).
fn digits_only(phone_number: &str) -> String {
    phone_number.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /whatsapp/send: `{ phoneNumber, message }` -> `{ success, sid }`.
pub async fn send_whatsapp(
    State(state): State<GatewayState>,
    Json(req): Json<SendRequest>,
) -> impl IntoResponse {
    let phone = req.phone_number.filter(|s| !s.trim().is_empty());
    let message = req.message.filter(|s| !s.is_empty());
    let (Some(phone), Some(message)) = (phone, message) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Se requieren phoneNumber y message" })),
        );
    };
    match state.whatsapp.send_text(&phone, &message).await {
        Ok(sid) => (StatusCode::OK, Json(json!({ "success": true, "sid": sid }))),
        Err(e) => {
            log::warn!("whatsapp send failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
