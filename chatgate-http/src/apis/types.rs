use chatgate_core::{ApiStatus, Chat, ChatMessage, SessionKey, SessionRecord, SessionSnapshot, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    pub account_id: Option<String>,
    pub session_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StopSessionRequest {
    pub session_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRefQuery {
    pub session_ref: Option<String>,
}

/// `limit` stays a raw string so bad values fall back to the default instead of rejecting
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    pub session_ref: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_ref: String,
    pub status: ApiStatus,
}

impl SessionStatusResponse {
    pub fn new(key: &SessionKey, status: ApiStatus) -> Self {
        Self {
            session_ref: key.to_string(),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrResponse {
    pub qr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_ref: String,
    pub status: ApiStatus,
    /// Full lifecycle state, distinguishing `disconnected` from `awaiting_qr`
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        let snapshot = record.snapshot();
        Self {
            session_ref: record.key().to_string(),
            status: snapshot.status(),
            state: snapshot.state,
            created_at: record.created_at(),
            updated_at: snapshot.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub sessions: usize,
}

/// Payload of one SSE `session` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session_ref: String,
    pub status: ApiStatus,
    pub state: SessionState,
    pub qr: Option<String>,
}

impl SessionUpdate {
    pub fn from_snapshot(key: &SessionKey, snapshot: &SessionSnapshot) -> Self {
        Self {
            session_ref: key.to_string(),
            status: snapshot.status(),
            state: snapshot.state,
            qr: snapshot.pending_credential.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<Chat> for ConversationEntry {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            name: chat.name,
            phone: chat.phone,
            last_message_at: chat.last_message_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub id: String,
    pub direction: Direction,
    pub body: String,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<ChatMessage> for MessageEntry {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            direction: if message.from_me { Direction::Outbound } else { Direction::Inbound },
            body: message.body,
            sent_at: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageEntry>,
}
