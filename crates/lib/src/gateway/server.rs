//! Gateway HTTP + WebSocket server (single port).

use crate::chain::ResponderChain;
use crate::channels::{
    browser_socket_handler, receive_webhook, send_whatsapp, verify_webhook, ws_handler,
    ConnectionRegistry, WhatsAppClient,
};
use crate::complaints::ComplaintTrigger;
use crate::config::{self, Config};
use crate::events::{EventSink, RedisEventLog};
use crate::gateway::auth::{api_key_status, unauthorized, ApiKeyStatus};
use crate::history::HistoryStore;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const HEALTH_MESSAGE: &str = "Evolution API saludable (sin autenticación)";
const SERVICE_NAME: &str = "Evolution API";
const SERVICE_VERSION: &str = "1.0.0";

/// Shared state for the gateway (resolved secrets, stores, responders, open sockets).
#[derive(Clone)]
pub struct GatewayState {
    /// When Some, protected routes require a matching `apikey` header.
    pub api_key: Option<String>,
    /// Expected `hub.verify_token` for the WhatsApp webhook handshake.
    pub verify_token: Option<String>,
    pub history: Arc<HistoryStore>,
    pub events: Arc<dyn EventSink>,
    pub complaints: ComplaintTrigger,
    pub chain: ResponderChain,
    /// Open bridge sockets; webhook deliveries are fanned out to these.
    pub connections: Arc<ConnectionRegistry>,
    pub whatsapp: WhatsAppClient,
    /// Fired once on shutdown; every socket task closes its connection.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl GatewayState {
    /// Build state from config, resolving secrets from env. The event sink is passed in so
    /// callers choose the store.
    pub fn new(config: &Config, events: Arc<dyn EventSink>) -> Self {
        let whatsapp = WhatsAppClient::new(
            config.channels.whatsapp.graph_api_base.clone(),
            config::resolve_phone_number_id(config),
            config::resolve_access_token(config),
        );
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            api_key: config::resolve_api_key(config),
            verify_token: config::resolve_verify_token(config),
            history: Arc::new(HistoryStore::new(&config.history.path)),
            events,
            complaints: ComplaintTrigger::new(&config.complaints),
            chain: ResponderChain::from_config(&config.responders),
            connections: Arc::new(ConnectionRegistry::new()),
            whatsapp,
            shutdown_tx,
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_http))
        .route("/instance/fetchInstances", get(fetch_instances))
        .route("/webhook/wa", get(verify_webhook).post(receive_webhook))
        .route("/whatsapp/send", post(send_whatsapp))
        .route("/ws", get(ws_handler))
        .route("/socket", get(browser_socket_handler))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves, then close every open socket
/// and wait for connections to drain.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown_tx = state.shutdown_tx.clone();
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        log::info!("shutdown signal received, closing open sockets");
        let _ = shutdown_tx.send(());
    })
    .await
    .context("gateway server exited")?;
    Ok(())
}

pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) && config::resolve_api_key(&config).is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without an API key (set gateway.auth.apiKey or MUNBOT_API_KEY)",
            bind
        );
    }

    let (event_log, event_task) = RedisEventLog::spawn(&config.events)?;
    log::info!(
        "event log writer started ({}, list {})",
        config.events.redis_url,
        config.events.key
    );
    let state = GatewayState::new(&config, event_log);
    if state.verify_token.is_none() {
        log::warn!("no webhook verify token configured; GET /webhook/wa will answer 403");
    }

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    serve(listener, state, shutdown_signal()).await?;
    event_task.abort();
    log::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// GET / (protected).
async fn root(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    match api_key_status(&headers, state.api_key.as_deref()) {
        ApiKeyStatus::Valid => Json(json!({
            "message": SERVICE_NAME,
            "version": SERVICE_VERSION,
        }))
        .into_response(),
        ApiKeyStatus::Missing | ApiKeyStatus::Invalid => unauthorized(),
    }
}

/// GET /health: liveness without a key, history stats with a valid one.
async fn health_http(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    match api_key_status(&headers, state.api_key.as_deref()) {
        ApiKeyStatus::Missing => Json(json!({
            "status": "ok",
            "message": HEALTH_MESSAGE,
        }))
        .into_response(),
        ApiKeyStatus::Valid => {
            let messages = state.history.count().await;
            Json(json!({
                "status": "ok",
                "stats": { "messages": messages },
            }))
            .into_response()
        }
        ApiKeyStatus::Invalid => unauthorized(),
    }
}

async fn fetch_instances() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "instances": [
            {
                "id": "default",
                "name": "Instancia Principal",
                "status": "active",
                "description": "Instancia de ejemplo para Evolution Manager",
            }
        ],
    }))
}
