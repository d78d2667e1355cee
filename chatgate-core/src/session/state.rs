use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::ClientEvent;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a QR challenge to be scanned (initial state)
    AwaitingQr,
    /// Authenticated and connected
    Connected,
    /// Connection lost; the client may retry on its own
    Disconnected,
}

impl SessionState {
    /// Two-valued status reported over the API.
    /// `Disconnected` is folded into `WaitingForQr`.
    pub fn status(self) -> ApiStatus {
        match self {
            SessionState::Connected => ApiStatus::Connected,
            SessionState::AwaitingQr | SessionState::Disconnected => ApiStatus::WaitingForQr,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingQr => write!(f, "awaiting_qr"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Connected,
    WaitingForQr,
}

/// Everything a reader can observe about a session at one instant.
/// Published as a whole, so state and credential always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Latest unconsumed QR payload; only set while `AwaitingQr`
    pub pending_credential: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingQr,
            pending_credential: None,
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ApiStatus {
        self.state.status()
    }

    /// Apply one client event
    pub fn apply(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::QrIssued(payload) => {
                self.state = SessionState::AwaitingQr;
                self.pending_credential = Some(payload.clone());
            }
            ClientEvent::Ready => {
                self.state = SessionState::Connected;
                self.pending_credential = None;
            }
            ClientEvent::Disconnected(_) => {
                self.state = SessionState::Disconnected;
                self.pending_credential = None;
            }
        }
        self.updated_at = Utc::now();
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
