use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::key::SessionKey;

/// Lifecycle events emitted by a messaging client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A new authentication challenge (QR payload) must be scanned
    QrIssued(String),
    /// Authentication completed, the client is connected
    Ready,
    /// The connection was lost
    Disconnected(String),
}

pub type EventSender = mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub from_me: bool,
    pub body: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One connection to the messaging network.
///
/// Lifecycle events are not returned from these calls; they are pushed to the
/// [`EventSender`] handed to the client by its [`ClientFactory`].
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start connecting. Challenge/ready events follow asynchronously.
    async fn initialize(&self) -> Result<(), ClientError>;

    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError>;

    /// Fetch at most `limit` of the most recent messages of a chat
    async fn fetch_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<ChatMessage>, ClientError>;

    async fn logout(&self) -> Result<(), ClientError>;

    /// Release every resource held by the client
    async fn destroy(&self) -> Result<(), ClientError>;
}

/// Builds clients keyed by an opaque client id.
///
/// Construction is synchronous: the registry creates the client while holding
/// its map lock, and must not suspend before the new session is registered.
pub trait ClientFactory: Send + Sync {
    fn create(&self, client_id: &SessionKey, events: EventSender) -> Arc<dyn MessagingClient>;
}
