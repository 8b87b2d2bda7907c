//! Orchestrator client: `POST /orchestrate` with the question, sender context and session token.

use super::{http_client, Orchestrator, ResponderError};
use crate::channels::{CanonicalMessage, ChannelTag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "orchestrator";

/// Request body. `session_id` is sent as `null` until the orchestrator issues one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorRequest {
    pub pregunta: String,
    pub context: OrchestratorContext,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorContext {
    pub sender: String,
    pub channel: ChannelTag,
}

impl OrchestratorRequest {
    pub fn from_message(msg: &CanonicalMessage, session_token: Option<&str>) -> Self {
        Self {
            pregunta: msg.text.clone(),
            context: OrchestratorContext {
                sender: msg.sender.clone(),
                channel: msg.channel,
            },
            session_id: session_token.map(str::to_string),
        }
    }
}

/// Response body. Unknown fields are ignored; a body that does not decode counts as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrchestratorResponse {
    #[serde(default)]
    pub respuesta: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl OrchestratorResponse {
    /// The recognized reply field: `respuesta`, else `message`. Empty strings are not replies.
    pub fn reply_text(&self) -> Option<&str> {
        self.respuesta
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Clone)]
pub struct OrchestratorClient {
    url: String,
    client: reqwest::Client,
}

impl OrchestratorClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl Orchestrator for OrchestratorClient {
    async fn orchestrate(
        &self,
        request: &OrchestratorRequest,
    ) -> Result<OrchestratorResponse, ResponderError> {
        let res = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|source| ResponderError::Request {
                service: SERVICE,
                source,
            })?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ResponderError::Api {
                service: SERVICE,
                detail: format!("{} {}", status, body),
            });
        }
        let body = res.text().await.map_err(|source| ResponderError::Request {
            service: SERVICE,
            source,
        })?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            log::debug!("orchestrator body did not decode ({}): {}", e, body);
            OrchestratorResponse::default()
        }))
    }
}
