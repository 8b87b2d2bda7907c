//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.munbot/config.json`) and environment.
//! Secrets (API key, Meta credentials) may come from env so they stay out of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (WhatsApp Cloud API).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Remote responder endpoints (intent engine, LLM gateway, orchestrator).
    #[serde(default)]
    pub responders: RespondersConfig,

    /// Complaint side-channel.
    #[serde(default)]
    pub complaints: ComplaintsConfig,

    /// Message history file.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Event log store.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Gateway bind, port, and auth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP and both sockets (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    #[serde(default)]
    pub auth: GatewayAuthConfig,
}

/// Shared secret checked against the `apikey` header on protected routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAuthConfig {
    /// Overridden by MUNBOT_API_KEY env.
    pub api_key: Option<String>,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            auth: GatewayAuthConfig::default(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppChannelConfig,
}

/// WhatsApp Cloud API (Meta) config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppChannelConfig {
    /// Token Meta echoes during webhook verification. Overridden by META_VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Sender phone number id. Overridden by META_PHONE_ID env.
    pub phone_number_id: Option<String>,
    /// Graph API bearer token. Overridden by META_TOKEN env.
    pub access_token: Option<String>,
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

impl Default for WhatsAppChannelConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            phone_number_id: None,
            access_token: None,
            graph_api_base: default_graph_api_base(),
        }
    }
}

/// Responder endpoints, called in chain order: intent engine, LLM gateway, orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondersConfig {
    #[serde(default = "default_intent_url")]
    pub intent_url: String,
    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    #[serde(default = "default_orchestrator_url")]
    pub orchestrator_url: String,
    /// Per-call timeout applied to every responder request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_intent_url() -> String {
    "http://localhost:5005/webhooks/evolution".to_string()
}

fn default_llm_url() -> String {
    "http://llm-gateway:8000/process".to_string()
}

fn default_orchestrator_url() -> String {
    "http://mcp-core:5000/orchestrate".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RespondersConfig {
    fn default() -> Self {
        Self {
            intent_url: default_intent_url(),
            llm_url: default_llm_url(),
            orchestrator_url: default_orchestrator_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RespondersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Complaint trigger: keyword match on message text, notification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintsConfig {
    #[serde(default = "default_complaints_url")]
    pub url: String,
    /// Matched case-insensitively as a substring of the message text.
    #[serde(default = "default_complaint_keyword")]
    pub keyword: String,
}

fn default_complaints_url() -> String {
    "http://complaints-api:3001/webhook/new-complaint".to_string()
}

fn default_complaint_keyword() -> String {
    "reclamo".to_string()
}

impl Default for ComplaintsConfig {
    fn default() -> Self {
        Self {
            url: default_complaints_url(),
            keyword: default_complaint_keyword(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history.json")
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Redis list the events are pushed onto.
    #[serde(default = "default_events_key")]
    pub key: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_events_key() -> String {
    "message_events".to_string()
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key: default_events_key(),
        }
    }
}

/// Env value if set and non-empty, else the trimmed config value if non-empty.
fn env_or(var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the API key: env MUNBOT_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    env_or("MUNBOT_API_KEY", config.gateway.auth.api_key.as_ref())
}

/// Resolve the webhook verify token: env META_VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_or(
        "META_VERIFY_TOKEN",
        config.channels.whatsapp.verify_token.as_ref(),
    )
}

/// Resolve the Cloud API phone number id: env META_PHONE_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    env_or(
        "META_PHONE_ID",
        config.channels.whatsapp.phone_number_id.as_ref(),
    )
}

/// Resolve the Cloud API access token: env META_TOKEN overrides config.
pub fn resolve_access_token(config: &Config) -> Option<String> {
    env_or("META_TOKEN", config.channels.whatsapp.access_token.as_ref())
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MUNBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".munbot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
