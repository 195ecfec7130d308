//! Two-round threshold signing
//!
//! Round 1 exchanges nonce shares (x-share kept, r-share offered); round 2
//! turns the counterparty's r-share into this party's g-share. The
//! Coordination Service combines the two g-shares.

mod coordinator;
mod local;
mod messages;

pub use coordinator::{OfferedSession, SigningSessionCoordinator};
pub use local::sign_locally;
pub use messages::*;

use crate::{Error, Result, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Progress of one party through a signing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Init,
    XShareReady,
    RShareOffered,
    AwaitingCounterpartyRShare,
    GShareReady,
    Submitted,
    Failed,
}

impl SessionState {
    /// The only state reachable on success, `None` once terminal
    pub fn next(self) -> Option<SessionState> {
        match self {
            SessionState::Init => Some(SessionState::XShareReady),
            SessionState::XShareReady => Some(SessionState::RShareOffered),
            SessionState::RShareOffered => Some(SessionState::AwaitingCounterpartyRShare),
            SessionState::AwaitingCounterpartyRShare => Some(SessionState::GShareReady),
            SessionState::GShareReady => Some(SessionState::Submitted),
            SessionState::Submitted | SessionState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State tracker for one session; failures are terminal
#[derive(Debug, Clone)]
pub struct SigningSession {
    tx_request_id: String,
    role: Role,
    state: SessionState,
}

impl SigningSession {
    pub fn new(tx_request_id: impl Into<String>, role: Role) -> Self {
        Self {
            tx_request_id: tx_request_id.into(),
            role,
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tx_request_id(&self) -> &str {
        &self.tx_request_id
    }

    /// Move to `to`, which must be the successor of the current state
    pub fn advance(&mut self, to: SessionState) -> Result<()> {
        if self.state.next() != Some(to) || to == SessionState::Failed {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(
            role = %self.role,
            tx_request_id = %self.tx_request_id,
            from = %self.state,
            to = %to,
            "Signing session advanced"
        );
        self.state = to;
        Ok(())
    }

    /// Mark the session failed; it must be restarted from `Init`
    pub fn fail(&mut self, error: &Error) {
        warn!(
            role = %self.role,
            tx_request_id = %self.tx_request_id,
            state = %self.state,
            kind = ?error.kind(),
            error = %error,
            "Signing session failed"
        );
        self.state = SessionState::Failed;
    }
}
