use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{ApiStatus, LifecycleAdapter, SessionSnapshot, SessionState};
use crate::client::{EventReceiver, MessagingClient};
use crate::key::SessionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopPhase {
    Running,
    Stopping,
    Stopped,
}

/// A single messaging session - one client connection and its lifecycle state
pub struct SessionRecord {
    key: SessionKey,
    created_at: DateTime<Utc>,
    client: Arc<dyn MessagingClient>,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
    adapter_task: JoinHandle<()>,
    stop_phase: watch::Sender<StopPhase>,
}

impl SessionRecord {
    /// Create a record in `AwaitingQr` and spawn its lifecycle adapter.
    /// Does not start the client; the registry does that once the record is registered.
    pub fn spawn(key: SessionKey, client: Arc<dyn MessagingClient>, events: EventReceiver) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::new());
        let snapshot = Arc::new(snapshot);
        let adapter_task = LifecycleAdapter::new(key.clone(), snapshot.clone(), events).spawn();

        Self {
            key,
            created_at: Utc::now(),
            client,
            snapshot,
            adapter_task,
            stop_phase: watch::channel(StopPhase::Running).0,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn client(&self) -> &Arc<dyn MessagingClient> {
        &self.client
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn status(&self) -> ApiStatus {
        self.state().status()
    }

    pub fn pending_credential(&self) -> Option<String> {
        self.snapshot.borrow().pending_credential.clone()
    }

    /// Watch snapshot changes. The channel closes once the record is dropped.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Mark the session as stopping. Returns false if a stop already began.
    pub(crate) fn begin_stop(&self) -> bool {
        self.stop_phase.send_if_modified(|phase| {
            if *phase == StopPhase::Running {
                *phase = StopPhase::Stopping;
                true
            } else {
                false
            }
        })
    }

    /// Teardown has finished and the record is out of the registry
    pub(crate) fn mark_stopped(&self) {
        self.stop_phase.send_replace(StopPhase::Stopped);
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop_phase.borrow() != StopPhase::Running
    }

    /// Resolves once a stop in progress has finished
    pub(crate) async fn stopped(&self) {
        let mut rx = self.stop_phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == StopPhase::Stopped).await;
    }
}

impl Drop for SessionRecord {
    fn drop(&mut self) {
        debug!("[] - [{}] Dropping session record", self.key);
        self.adapter_task.abort();
    }
}
