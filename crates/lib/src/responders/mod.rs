//! Remote responder clients.
//!
//! Three peer services can produce a reply: the intent engine, the language-model gateway and
//! the orchestrator. Each is one outbound HTTP call with its own payload shape; the chain in
//! [`crate::chain`] decides how their results combine.

mod intent;
mod llm;
mod orchestrator;

pub use intent::IntentClient;
pub use llm::LlmGatewayClient;
pub use orchestrator::{
    OrchestratorClient, OrchestratorContext, OrchestratorRequest, OrchestratorResponse,
};

use crate::channels::CanonicalMessage;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} api error: {detail}")]
    Api {
        service: &'static str,
        detail: String,
    },
}

/// A fallback-stage responder: may or may not produce a reply for a message.
#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &'static str;
    /// `Ok(None)` when the service answered without a usable reply.
    async fn respond(&self, msg: &CanonicalMessage) -> Result<Option<String>, ResponderError>;
}

/// The authoritative final-stage responder.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn orchestrate(
        &self,
        request: &OrchestratorRequest,
    ) -> Result<OrchestratorResponse, ResponderError>;
}

/// HTTP client with the per-call timeout every responder uses.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("building responder http client failed, using defaults: {}", e);
            reqwest::Client::new()
        })
}

/// `{ "reply": ... }` body shared by the intent engine and the LLM gateway.
#[derive(Debug, Deserialize)]
struct ReplyBody {
    #[serde(default)]
    reply: Option<String>,
}

/// POST `{ "message": <raw payload> }` and read `reply`. Blank replies count as none.
async fn post_for_reply(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    msg: &CanonicalMessage,
) -> Result<Option<String>, ResponderError> {
    let body = serde_json::json!({ "message": msg.raw_payload });
    let res = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|source| ResponderError::Request { service, source })?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(ResponderError::Api {
            service,
            detail: format!("{} {}", status, body),
        });
    }
    let data: ReplyBody = res
        .json()
        .await
        .map_err(|source| ResponderError::Request { service, source })?;
    Ok(data.reply.filter(|r| !r.trim().is_empty()))
}
