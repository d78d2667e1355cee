use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SessionSnapshot;
use crate::client::{ClientEvent, EventReceiver};
use crate::key::SessionKey;

/// Bridges a client's event channel to its session snapshot.
///
/// Events are applied one at a time in emission order. Each transition is a
/// single `send_modify`, so watchers never see a half-applied update.
pub struct LifecycleAdapter {
    key: SessionKey,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
    events: EventReceiver,
}

impl LifecycleAdapter {
    pub fn new(
        key: SessionKey,
        snapshot: Arc<watch::Sender<SessionSnapshot>>,
        events: EventReceiver,
    ) -> Self {
        Self { key, snapshot, events }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain events until the client drops its sender
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(&event);
        }
        debug!("[] - [{}] Client event channel closed", self.key);
    }

    fn handle(&self, event: &ClientEvent) {
        match event {
            ClientEvent::QrIssued(_) => info!("[] - [{}] QR code issued", self.key),
            ClientEvent::Ready => info!("[] - [{}] Client ready", self.key),
            ClientEvent::Disconnected(reason) => {
                warn!("[] - [{}] Client disconnected: {}", self.key, reason)
            }
        }
        self.snapshot.send_modify(|snapshot| snapshot.apply(event));
    }
}
