//! Complaint side-channel: keyword match on inbound text, detached notification POST.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::channels::CanonicalMessage;
use crate::config::ComplaintsConfig;

/// Body posted to the complaints service.
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintNotice {
    #[serde(rename = "number")]
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ComplaintTrigger {
    url: String,
    keyword: String,
    client: reqwest::Client,
}

impl ComplaintTrigger {
    pub fn new(config: &ComplaintsConfig) -> Self {
        Self {
            url: config.url.clone(),
            keyword: config.keyword.trim().to_lowercase(),
            client: reqwest::Client::new(),
        }
    }

    /// True when the lowercased text contains the keyword. An empty keyword never matches.
    pub fn matches(&self, text: &str) -> bool {
        !self.keyword.is_empty() && text.to_lowercase().contains(&self.keyword)
    }

    /// Fire one notification if the message matches. Returns whether it fired; the POST runs
    /// on a detached task and its outcome is only logged.
    pub fn check(&self, msg: &CanonicalMessage) -> bool {
        if !self.matches(&msg.text) {
            return false;
        }
        let notice = ComplaintNotice {
            sender: msg.sender.clone(),
            text: msg.text.clone(),
            timestamp: Utc::now(),
        };
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&notice).send().await {
                Ok(res) if res.status().is_success() => {
                    log::debug!("complaint forwarded for {}", notice.sender);
                }
                Ok(res) => {
                    log::warn!("complaints service returned {}", res.status());
                }
                Err(e) => {
                    log::warn!("complaints service unreachable: {}", e);
                }
            }
        });
        true
    }
}
