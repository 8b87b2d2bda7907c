//! Shared fixtures: mock responder services, a recording event sink, and an in-process gateway.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures_util::StreamExt;
use munbot::config::Config;
use munbot::events::{EventSink, LogEvent};
use munbot::gateway::{self, GatewayState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

pub const API_KEY: &str = "test-api-key";
pub const VERIFY_TOKEN: &str = "verify-me";
pub const PHONE_NUMBER_ID: &str = "1234567890";
pub const ACCESS_TOKEN: &str = "graph-token";

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

pub fn temp_history_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("munbot-test-{}", uuid::Uuid::new_v4()))
        .join("history.json")
}

/// Event sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("sink lock").clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: LogEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}

/// Knobs and counters for the mock intent engine, LLM gateway, orchestrator, complaints
/// service and Graph API, all served from one axum app.
#[derive(Clone, Default)]
pub struct Mocks {
    pub orchestrator_fails: Arc<AtomicBool>,
    pub orchestrator_requests: Arc<Mutex<Vec<Value>>>,
    pub intent_calls: Arc<AtomicUsize>,
    pub complaints: Arc<AtomicUsize>,
    pub graph_requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    issued_sessions: Arc<AtomicUsize>,
}

impl Mocks {
    pub fn orchestrator_requests(&self) -> Vec<Value> {
        self.orchestrator_requests.lock().expect("mock lock").clone()
    }

    pub fn complaint_count(&self) -> usize {
        self.complaints.load(Ordering::SeqCst)
    }
}

async fn intent(State(m): State<Mocks>, Json(_body): Json<Value>) -> Json<Value> {
    m.intent_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "reply": "respuesta del motor de intenciones" }))
}

async fn llm(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({ "reply": "respuesta del llm" }))
}

/// Issues `sess-N` when the request carries no session, echoes it otherwise.
async fn orchestrate(State(m): State<Mocks>, Json(body): Json<Value>) -> Response {
    m.orchestrator_requests
        .lock()
        .expect("mock lock")
        .push(body.clone());
    if m.orchestrator_fails.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let session = body
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "sess-{}",
                m.issued_sessions.fetch_add(1, Ordering::SeqCst) + 1
            )
        });
    let pregunta = body.get("pregunta").and_then(Value::as_str).unwrap_or("");
    Json(json!({ "respuesta": format!("eco: {}", pregunta), "session_id": session })).into_response()
}

async fn complaint(State(m): State<Mocks>, Json(_body): Json<Value>) -> StatusCode {
    m.complaints.fetch_add(1, Ordering::SeqCst);
    StatusCode::CREATED
}

async fn graph_send(State(m): State<Mocks>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    m.graph_requests.lock().expect("mock lock").push((auth, body));
    Json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "input": "56998765432", "wa_id": "56998765432" }],
        "messages": [{ "id": "wamid.TEST" }]
    }))
}

/// Start the mock services; returns their base URL.
pub async fn start_mocks() -> (String, Mocks) {
    let mocks = Mocks::default();
    let app = Router::new()
        .route("/intent", post(intent))
        .route("/llm", post(llm))
        .route("/orchestrate", post(orchestrate))
        .route("/complaints", post(complaint))
        .route(&format!("/graph/{}/messages", PHONE_NUMBER_ID), post(graph_send))
        .with_state(mocks.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mocks");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), mocks)
}

pub fn test_config(mock_base: &str) -> Config {
    let mut config = Config::default();
    config.gateway.auth.api_key = Some(API_KEY.to_string());
    config.channels.whatsapp.verify_token = Some(VERIFY_TOKEN.to_string());
    config.channels.whatsapp.phone_number_id = Some(PHONE_NUMBER_ID.to_string());
    config.channels.whatsapp.access_token = Some(ACCESS_TOKEN.to_string());
    config.channels.whatsapp.graph_api_base = format!("{}/graph", mock_base);
    config.responders.intent_url = format!("{}/intent", mock_base);
    config.responders.llm_url = format!("{}/llm", mock_base);
    config.responders.orchestrator_url = format!("{}/orchestrate", mock_base);
    config.responders.timeout_secs = 5;
    config.complaints.url = format!("{}/complaints", mock_base);
    config.history.path = temp_history_path();
    config
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub sink: Arc<RecordingSink>,
    pub mocks: Mocks,
}

impl TestGateway {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> WsClient {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .expect("ws connect");
        ws
    }

    /// Wait until `n` bridge sockets are registered.
    pub async fn wait_for_connections(&self, n: usize) {
        for _ in 0..100 {
            if self.state.connections.len().await == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {} registered connection(s)", n);
    }
}

/// Gateway on an ephemeral port, wired to fresh mocks and a recording sink.
pub async fn start_gateway() -> TestGateway {
    start_gateway_with(|_| {}).await
}

/// Like [`start_gateway`], with a hook to adjust the config before the state is built.
pub async fn start_gateway_with(configure: impl FnOnce(&mut Config)) -> TestGateway {
    let (mock_base, mocks) = start_mocks().await;
    let sink = Arc::new(RecordingSink::default());
    let mut config = test_config(&mock_base);
    configure(&mut config);
    let state = GatewayState::new(&config, sink.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let addr = listener.local_addr().expect("local_addr");
    let serve_state = state.clone();
    tokio::spawn(async move {
        let _ = gateway::serve(listener, serve_state, std::future::pending()).await;
    });
    TestGateway {
        addr,
        state,
        sink,
        mocks,
    }
}

/// Next text frame, parsed as JSON. Fails the test after 5s.
pub async fn next_json(ws: &mut WsClient) -> Value {
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => panic!("no frame within 5s"),
            msg = ws.next() => {
                match msg.expect("socket closed").expect("socket error") {
                    Message::Text(text) => return serde_json::from_str(&text).expect("frame json"),
                    _ => continue,
                }
            }
        }
    }
}
