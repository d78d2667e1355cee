//! In-process messaging client.
//!
//! No wire protocol lives in this workspace. The simulated backend plays the
//! part of the network: it issues QR challenges, optionally "scans" them after
//! a delay, and serves whatever chats and messages were seeded through its
//! [`SimulatedControl`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::client::{Chat, ChatMessage, ClientEvent, ClientFactory, EventSender, MessagingClient};
use crate::error::ClientError;
use crate::key::SessionKey;

#[derive(Default)]
struct SimulatedState {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<ChatMessage>>,
    fail_queries: bool,
    fail_teardown: bool,
    hang_teardown: bool,
    initialized: bool,
    logged_out: bool,
    destroyed: bool,
}

fn lock(state: &Mutex<SimulatedState>) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SimulatedClient {
    client_id: SessionKey,
    events: EventSender,
    state: Arc<Mutex<SimulatedState>>,
    auto_ready_after: Option<Duration>,
}

impl SimulatedClient {
    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("[] - [{}] Event dropped, session is gone", self.client_id);
        }
    }

    async fn teardown_step(&self, mark: impl FnOnce(&mut SimulatedState)) -> Result<(), ClientError> {
        let (hang, fail) = {
            let state = lock(&self.state);
            (state.hang_teardown, state.fail_teardown)
        };
        if hang {
            futures::future::pending::<()>().await;
        }
        if fail {
            return Err(ClientError::Protocol("teardown rejected".to_string()));
        }
        mark(&mut lock(&self.state));
        Ok(())
    }

    fn check_queryable(state: &SimulatedState) -> Result<(), ClientError> {
        if state.destroyed {
            return Err(ClientError::Destroyed);
        }
        if state.fail_queries {
            return Err(ClientError::Protocol("query failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for SimulatedClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        {
            let mut state = lock(&self.state);
            if state.destroyed {
                return Err(ClientError::Destroyed);
            }
            state.initialized = true;
        }

        self.emit(ClientEvent::QrIssued(format!(
            "chatgate:{}:{}",
            self.client_id,
            Uuid::new_v4().simple()
        )));

        if let Some(delay) = self.auto_ready_after {
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(ClientEvent::Ready);
            });
        }
        Ok(())
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, ClientError> {
        let state = lock(&self.state);
        Self::check_queryable(&state)?;
        Ok(state.chats.clone())
    }

    async fn fetch_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<ChatMessage>, ClientError> {
        let state = lock(&self.state);
        Self::check_queryable(&state)?;
        let messages = state.messages.get(chat_id).map(Vec::as_slice).unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.teardown_step(|state| state.logged_out = true).await
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        self.teardown_step(|state| state.destroyed = true).await
    }
}

/// Handle for driving one simulated client from the outside
#[derive(Clone)]
pub struct SimulatedControl {
    events: EventSender,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedControl {
    pub fn emit_qr(&self, payload: impl Into<String>) {
        let _ = self.events.send(ClientEvent::QrIssued(payload.into()));
    }

    pub fn emit_ready(&self) {
        let _ = self.events.send(ClientEvent::Ready);
    }

    pub fn emit_disconnected(&self, reason: impl Into<String>) {
        let _ = self.events.send(ClientEvent::Disconnected(reason.into()));
    }

    pub fn seed_chat(&self, chat: Chat) {
        lock(&self.state).chats.push(chat);
    }

    /// Append messages to a chat, oldest first
    pub fn seed_messages(&self, chat_id: &str, messages: Vec<ChatMessage>) {
        lock(&self.state)
            .messages
            .entry(chat_id.to_string())
            .or_default()
            .extend(messages);
    }

    pub fn fail_queries(&self, fail: bool) {
        lock(&self.state).fail_queries = fail;
    }

    pub fn fail_teardown(&self, fail: bool) {
        lock(&self.state).fail_teardown = fail;
    }

    /// Make logout/destroy never complete
    pub fn hang_teardown(&self, hang: bool) {
        lock(&self.state).hang_teardown = hang;
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    pub fn is_logged_out(&self) -> bool {
        lock(&self.state).logged_out
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }
}

/// Factory for [`SimulatedClient`]s. Keeps a control handle for the most
/// recent client of every key.
#[derive(Default)]
pub struct SimulatedClientFactory {
    auto_ready_after: Option<Duration>,
    controls: Mutex<HashMap<SessionKey, SimulatedControl>>,
    created: AtomicUsize,
}

impl SimulatedClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `Ready` this long after each client initializes
    pub fn with_auto_ready(mut self, delay: Option<Duration>) -> Self {
        self.auto_ready_after = delay;
        self
    }

    pub fn control(&self, client_id: &SessionKey) -> Option<SimulatedControl> {
        self.controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(client_id)
            .cloned()
    }

    /// Number of clients constructed so far
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ClientFactory for SimulatedClientFactory {
    fn create(&self, client_id: &SessionKey, events: EventSender) -> Arc<dyn MessagingClient> {
        let state = Arc::new(Mutex::new(SimulatedState::default()));
        let control = SimulatedControl {
            events: events.clone(),
            state: state.clone(),
        };
        self.controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(client_id.clone(), control);
        self.created.fetch_add(1, Ordering::SeqCst);

        debug!("[] - [{}] Simulated client constructed", client_id);
        Arc::new(SimulatedClient {
            client_id: client_id.clone(),
            events,
            state,
            auto_ready_after: self.auto_ready_after,
        })
    }
}
