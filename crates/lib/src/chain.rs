//! Responder chain: resolve one reply per canonical message.
//!
//! Fixed order: intent engine, then the LLM gateway only if the intent engine gave nothing,
//! then the orchestrator, always. The orchestrator is authoritative: a recognized reply
//! replaces whatever the earlier stages produced, and a malformed or failed orchestrator call
//! yields a fixed fallback string, also discarding the earlier candidate. Every call is
//! isolated; a failure is logged and the chain moves on.

use std::sync::Arc;

use crate::channels::{CanonicalMessage, Reply};
use crate::config::RespondersConfig;
use crate::responders::{
    IntentClient, LlmGatewayClient, Orchestrator, OrchestratorClient, OrchestratorRequest,
    Responder,
};
use crate::session::Session;

/// Orchestrator answered but with no recognized reply field.
pub const NO_VALID_REPLY: &str = "No se recibió respuesta válida del MCP.";
/// Orchestrator call failed (transport, timeout, non-2xx).
pub const PROCESSING_ERROR_REPLY: &str = "Lo siento, hubo un error procesando tu solicitud.";

#[derive(Clone)]
pub struct ResponderChain {
    intent: Arc<dyn Responder>,
    llm: Arc<dyn Responder>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResponderChain {
    pub fn new(
        intent: Arc<dyn Responder>,
        llm: Arc<dyn Responder>,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        Self {
            intent,
            llm,
            orchestrator,
        }
    }

    /// HTTP clients for the three configured endpoints.
    pub fn from_config(config: &RespondersConfig) -> Self {
        let timeout = config.timeout();
        Self::new(
            Arc::new(IntentClient::new(&config.intent_url, timeout)),
            Arc::new(LlmGatewayClient::new(&config.llm_url, timeout)),
            Arc::new(OrchestratorClient::new(&config.orchestrator_url, timeout)),
        )
    }

    /// Full chain, used by the WebSocket channel.
    pub async fn resolve(&self, msg: &CanonicalMessage, session: &mut Session) -> Reply {
        let mut candidate = self.ask(self.intent.as_ref(), msg).await;
        if candidate.is_none() {
            candidate = self.ask(self.llm.as_ref(), msg).await;
        }
        if let Some(ref c) = candidate {
            log::debug!(
                "chain: earlier stage replied ({} chars), orchestrator still decides",
                c.len()
            );
        }
        self.resolve_direct(msg, session).await
    }

    /// Orchestrator only, used by the browser channel.
    pub async fn resolve_direct(&self, msg: &CanonicalMessage, session: &mut Session) -> Reply {
        let request = OrchestratorRequest::from_message(msg, session.token());
        match self.orchestrator.orchestrate(&request).await {
            Ok(response) => {
                session.update(response.session_id.clone());
                match response.reply_text() {
                    Some(text) => Reply::new(text),
                    None => {
                        log::warn!("orchestrator response had no reply field");
                        Reply::new(NO_VALID_REPLY)
                    }
                }
            }
            Err(e) => {
                log::warn!("orchestrator call failed: {}", e);
                Reply::new(PROCESSING_ERROR_REPLY)
            }
        }
    }

    async fn ask(&self, responder: &dyn Responder, msg: &CanonicalMessage) -> Option<String> {
        match responder.respond(msg).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("{} failed: {}", responder.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelTag;
    use crate::responders::{OrchestratorResponse, ResponderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubResponder {
        reply: Result<Option<String>, String>,
        calls: AtomicUsize,
    }

    impl StubResponder {
        fn new(reply: Result<Option<&str>, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(|r| r.map(str::to_string)).map_err(str::to_string),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Responder for StubResponder {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn respond(&self, _msg: &CanonicalMessage) -> Result<Option<String>, ResponderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|detail| ResponderError::Api {
                service: "stub",
                detail,
            })
        }
    }

    struct StubOrchestrator {
        response: Result<OrchestratorResponse, String>,
        seen: Mutex<Vec<OrchestratorRequest>>,
    }

    impl StubOrchestrator {
        fn new(response: Result<OrchestratorResponse, &str>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<OrchestratorRequest> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Orchestrator for StubOrchestrator {
        async fn orchestrate(
            &self,
            request: &OrchestratorRequest,
        ) -> Result<OrchestratorResponse, ResponderError> {
            self.seen.lock().expect("lock").push(request.clone());
            self.response.clone().map_err(|detail| ResponderError::Api {
                service: "orchestrator",
                detail,
            })
        }
    }

    fn answer(text: &str, session: Option<&str>) -> OrchestratorResponse {
        OrchestratorResponse {
            respuesta: Some(text.to_string()),
            message: None,
            session_id: session.map(str::to_string),
        }
    }

    fn msg(text: &str) -> CanonicalMessage {
        CanonicalMessage::new(
            ChannelTag::Whatsapp,
            "+56911111111",
            text,
            serde_json::json!({ "number": "+56911111111", "text": text }),
        )
    }

    #[tokio::test]
    async fn orchestrator_overrides_intent_reply() {
        let intent = StubResponder::new(Ok(Some("from intent")));
        let llm = StubResponder::new(Ok(Some("from llm")));
        let orch = StubOrchestrator::new(Ok(answer("from orchestrator", None)));
        let chain = ResponderChain::new(intent.clone(), llm.clone(), orch.clone());
        let reply = chain.resolve(&msg("hola"), &mut Session::new()).await;
        assert_eq!(reply.text, "from orchestrator");
        assert_eq!(intent.calls(), 1);
        assert_eq!(llm.calls(), 0, "llm is skipped when intent replied");
        assert_eq!(orch.requests().len(), 1);
    }

    #[tokio::test]
    async fn failed_orchestrator_discards_earlier_success() {
        let intent = StubResponder::new(Ok(Some("from intent")));
        let llm = StubResponder::new(Ok(Some("from llm")));
        let orch = StubOrchestrator::new(Err("down"));
        let chain = ResponderChain::new(intent, llm, orch);
        let reply = chain.resolve(&msg("hola"), &mut Session::new()).await;
        assert_eq!(reply.text, PROCESSING_ERROR_REPLY);
    }

    #[tokio::test]
    async fn malformed_orchestrator_response_uses_fixed_string() {
        let intent = StubResponder::new(Ok(None));
        let llm = StubResponder::new(Ok(Some("from llm")));
        let orch = StubOrchestrator::new(Ok(OrchestratorResponse::default()));
        let chain = ResponderChain::new(intent, llm.clone(), orch);
        let reply = chain.resolve(&msg("hola"), &mut Session::new()).await;
        assert_eq!(reply.text, NO_VALID_REPLY);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn earlier_failures_still_reach_orchestrator() {
        let intent = StubResponder::new(Err("timeout"));
        let llm = StubResponder::new(Err("502"));
        let orch = StubOrchestrator::new(Ok(OrchestratorResponse {
            respuesta: None,
            message: Some("via message field".to_string()),
            session_id: None,
        }));
        let chain = ResponderChain::new(intent.clone(), llm.clone(), orch.clone());
        let reply = chain.resolve(&msg("hola"), &mut Session::new()).await;
        assert_eq!(reply.text, "via message field");
        assert_eq!(intent.calls(), 1);
        assert_eq!(llm.calls(), 1);
        assert_eq!(orch.requests().len(), 1);
    }

    #[tokio::test]
    async fn session_token_is_sent_and_updated() {
        let orch = StubOrchestrator::new(Ok(answer("ok", Some("sess-9"))));
        let chain = ResponderChain::new(
            StubResponder::new(Ok(None)),
            StubResponder::new(Ok(None)),
            orch.clone(),
        );
        let mut session = Session::new();
        chain.resolve(&msg("uno"), &mut session).await;
        assert_eq!(session.token(), Some("sess-9"));
        chain.resolve(&msg("dos"), &mut session).await;
        let requests = orch.requests();
        assert_eq!(requests[0].session_id, None);
        assert_eq!(requests[1].session_id.as_deref(), Some("sess-9"));
        assert_eq!(requests[1].pregunta, "dos");
    }

    #[tokio::test]
    async fn resolve_direct_skips_earlier_stages() {
        let intent = StubResponder::new(Ok(Some("from intent")));
        let llm = StubResponder::new(Ok(Some("from llm")));
        let orch = StubOrchestrator::new(Ok(answer("direct", None)));
        let chain = ResponderChain::new(intent.clone(), llm.clone(), orch);
        let reply = chain.resolve_direct(&msg("hola"), &mut Session::new()).await;
        assert_eq!(reply.text, "direct");
        assert_eq!(intent.calls(), 0);
        assert_eq!(llm.calls(), 0);
    }
}
