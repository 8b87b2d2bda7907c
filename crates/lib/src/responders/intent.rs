//! Intent engine client (Rasa-style REST webhook).

use super::{http_client, post_for_reply, Responder, ResponderError};
use crate::channels::CanonicalMessage;
use async_trait::async_trait;
use std::time::Duration;

const SERVICE: &str = "intent engine";

#[derive(Clone)]
pub struct IntentClient {
    url: String,
    client: reqwest::Client,
}

impl IntentClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl Responder for IntentClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn respond(&self, msg: &CanonicalMessage) -> Result<Option<String>, ResponderError> {
        post_for_reply(&self.client, SERVICE, &self.url, msg).await
    }
}
