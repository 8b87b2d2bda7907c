//! Per-connection session correlation.
//!
//! The orchestrator issues an opaque session token to tie multi-turn exchanges together.
//! Each socket connection owns exactly one [`Session`]; it lives in the connection task and is
//! never shared, so one user's conversation state cannot leak into another's.

/// Opaque orchestrator session token.
pub type SessionToken = String;

/// Session state for one logical connection. Starts without a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<SessionToken>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to attach to the next orchestrator request, if one has been issued.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Store a token returned by the orchestrator. `None` or blank keeps the current token.
    pub fn update(&mut self, token: Option<SessionToken>) {
        if let Some(t) = token.filter(|t| !t.trim().is_empty()) {
            self.token = Some(t);
        }
    }

    /// Drop the token (connection closed).
    pub fn reset(&mut self) {
        self.token = None;
    }
}
