use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::client::{Chat, ChatMessage, ClientFactory};
use crate::error::{ClientError, SessionError};
use crate::key::{SessionKey, DEFAULT_MESSAGE_LIMIT};
use crate::session::SessionRecord;

/// Configuration for the session registry
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Maximum number of concurrent sessions (None = unlimited)
    pub max_sessions: Option<usize>,
    /// Upper bound for each of logout and destroy when a session stops
    pub teardown_timeout: Duration,
    /// Message count used when a request carries no usable limit
    pub default_message_limit: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: None,
            teardown_timeout: Duration::from_secs(10),
            default_message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

/// Session registry - the authoritative map from session key to session record.
/// Handles creation, lookup, teardown and queries against live clients.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, Arc<SessionRecord>>>,
    factory: Arc<dyn ClientFactory>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>, config: RegistryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the session for `key`, creating it if needed.
    ///
    /// The map lock is held from lookup until the new record is inserted, and
    /// client construction does not suspend, so concurrent callers for the
    /// same key all get the same record and only one client is ever built.
    /// A session that is being stopped is waited out before a new client is
    /// built for its key. The connect is started after registration. The
    /// returned flag tells whether this call created the session.
    pub async fn get_or_create(&self, key: &SessionKey) -> Result<(Arc<SessionRecord>, bool), SessionError> {
        loop {
            let mut sessions = self.sessions.lock().await;

            if let Some(record) = sessions.get(key) {
                if !record.is_stopping() {
                    debug!("[] - [{}] Using existing session", key);
                    return Ok((record.clone(), false));
                }

                let stopping = record.clone();
                drop(sessions);
                debug!("[] - [{}] Waiting for previous session to stop", key);
                stopping.stopped().await;
                continue;
            }

            if let Some(max) = self.config.max_sessions {
                if sessions.len() >= max {
                    return Err(SessionError::TooManySessions(max));
                }
            }

            info!("[] - [{}] Creating new session", key);

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let client = self.factory.create(key, events_tx);
            let record = Arc::new(SessionRecord::spawn(key.clone(), client.clone(), events_rx));
            sessions.insert(key.clone(), record.clone());
            drop(sessions);

            let key_for_connect = key.clone();
            tokio::spawn(async move {
                if let Err(e) = client.initialize().await {
                    error!("[] - [{}] Client initialization failed: {}", key_for_connect, e);
                }
            });

            return Ok((record, true));
        }
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Arc<SessionRecord>> {
        self.sessions.lock().await.get(key).cloned()
    }

    /// Remove a session without tearing down its client.
    /// Returns whether a session existed.
    pub async fn remove(&self, key: &SessionKey) -> bool {
        self.sessions.lock().await.remove(key).is_some()
    }

    /// Stop a session: log out, release the client, then unregister it.
    ///
    /// The record stays registered, marked as stopping, until the bounded
    /// teardown is over, so no second client can be built for the key in the
    /// meantime. It is removed whatever the teardown outcome; failures are
    /// logged and swallowed. A stop that races another stop waits for it.
    pub async fn stop(&self, key: &SessionKey) -> Result<(), SessionError> {
        let record = self
            .get(key)
            .await
            .ok_or_else(|| SessionError::UnknownSession(key.to_string()))?;

        if !record.begin_stop() {
            debug!("[] - [{}] Stop already in progress", key);
            record.stopped().await;
            return Ok(());
        }

        info!("[] - [{}] Stopping session", key);
        self.finish_stop(&record).await;
        Ok(())
    }

    /// Stop every session. Used on process shutdown.
    pub async fn shutdown(&self) {
        let records: Vec<_> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|record| record.begin_stop())
            .cloned()
            .collect();
        if records.is_empty() {
            return;
        }

        info!("Shutting down {} session(s)", records.len());
        join_all(records.iter().map(|record| self.finish_stop(record))).await;
    }

    /// Tear down a record already marked as stopping, then unregister it
    async fn finish_stop(&self, record: &Arc<SessionRecord>) {
        if let Err(e) = self.teardown(record).await {
            warn!("{}", e);
        }

        {
            let mut sessions = self.sessions.lock().await;
            if sessions.get(record.key()).is_some_and(|current| Arc::ptr_eq(current, record)) {
                sessions.remove(record.key());
            }
        }
        record.mark_stopped();
        info!("[] - [{}] session removed from registry", record.key());
    }

    async fn teardown(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let limit = self.config.teardown_timeout;
        let client = record.client();

        // destroy runs even when logout fails or hangs
        let logout = timeout(limit, client.logout()).await;
        let destroy = timeout(limit, client.destroy()).await;

        let failures: Vec<String> = [("logout", logout), ("destroy", destroy)]
            .into_iter()
            .filter_map(|(step, outcome)| match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{} failed: {}", step, e)),
                Err(_) => Some(format!("{} timed out after {:?}", step, limit)),
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::TeardownFailure {
                key: record.key().to_string(),
                reason: failures.join("; "),
            })
        }
    }

    /// All sessions, oldest first
    pub async fn list(&self) -> Vec<Arc<SessionRecord>> {
        let mut records: Vec<_> = self.sessions.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.key().cmp(b.key())));
        records
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    async fn require(&self, key: &SessionKey) -> Result<Arc<SessionRecord>, SessionError> {
        self.get(key)
            .await
            .ok_or_else(|| SessionError::UnknownSession(key.to_string()))
    }

    pub async fn list_conversations(&self, key: &SessionKey) -> Result<Vec<Chat>, SessionError> {
        let record = self.require(key).await?;
        record
            .client()
            .list_chats()
            .await
            .map_err(|source| upstream(key, source))
    }

    pub async fn list_messages(
        &self,
        key: &SessionKey,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        let record = self.require(key).await?;
        record
            .client()
            .fetch_messages(chat_id, limit)
            .await
            .map_err(|source| upstream(key, source))
    }
}

fn upstream(key: &SessionKey, source: ClientError) -> SessionError {
    SessionError::UpstreamQueryFailure {
        key: key.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ApiStatus, SessionState};
    use crate::simulated::SimulatedClientFactory;

    fn registry_with(config: RegistryConfig) -> (Arc<SessionRegistry>, Arc<SimulatedClientFactory>) {
        let factory = Arc::new(SimulatedClientFactory::new());
        let registry = Arc::new(SessionRegistry::new(factory.clone(), config));
        (registry, factory)
    }

    fn registry() -> (Arc<SessionRegistry>, Arc<SimulatedClientFactory>) {
        registry_with(RegistryConfig::default())
    }

    /// Create a session and wait for its initial QR challenge
    async fn start(registry: &SessionRegistry, key: &SessionKey) -> Arc<SessionRecord> {
        let (record, _) = registry.get_or_create(key).await.unwrap();
        let mut rx = record.subscribe();
        timeout(Duration::from_secs(5), rx.wait_for(|s| s.pending_credential.is_some()))
            .await
            .expect("no QR challenge issued")
            .expect("session dropped");
        record
    }

    async fn wait_for_state(record: &SessionRecord, state: SessionState) {
        let mut rx = record.subscribe();
        timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
            .await
            .expect("state change timed out")
            .expect("session dropped");
    }

    #[tokio::test]
    async fn new_session_starts_awaiting_qr() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");

        let (record, created) = registry.get_or_create(&key).await.unwrap();

        assert!(created);
        assert_eq!(record.state(), SessionState::AwaitingQr);
        assert_eq!(record.status(), ApiStatus::WaitingForQr);
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation_builds_one_client() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                let key = key.clone();
                tokio::spawn(async move { registry.get_or_create(&key).await.unwrap() })
            })
            .collect();

        let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

        assert_eq!(factory.created_count(), 1);
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        let first = &results[0].0;
        assert!(results.iter().all(|(record, _)| Arc::ptr_eq(record, first)));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn connect_is_initiated_and_qr_becomes_pending() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");
        let (record, _) = registry.get_or_create(&key).await.unwrap();

        let mut rx = record.subscribe();
        let snapshot = timeout(Duration::from_secs(5), rx.wait_for(|s| s.pending_credential.is_some()))
            .await
            .unwrap()
            .unwrap()
            .clone();

        assert!(factory.control(&key).unwrap().is_initialized());
        assert_eq!(snapshot.state, SessionState::AwaitingQr);
        assert!(snapshot.pending_credential.unwrap().starts_with("chatgate:acc-1:"));
    }

    #[tokio::test]
    async fn ready_event_connects_the_session() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");
        let record = start(&registry, &key).await;

        factory.control(&key).unwrap().emit_ready();
        wait_for_state(&record, SessionState::Connected).await;

        assert_eq!(record.pending_credential(), None);
        assert_eq!(record.status(), ApiStatus::Connected);
    }

    #[tokio::test]
    async fn existing_session_is_reused() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");

        let (first, _) = registry.get_or_create(&key).await.unwrap();
        let (second, created) = registry.get_or_create(&key).await.unwrap();

        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test]
    async fn remove_then_get_returns_nothing() {
        let (registry, _) = registry();
        let key = SessionKey::from("acc-1");
        registry.get_or_create(&key).await.unwrap();

        assert!(registry.remove(&key).await);
        assert!(registry.get(&key).await.is_none());

        let never = SessionKey::from("never-created");
        assert!(!registry.remove(&never).await);
        assert!(registry.get(&never).await.is_none());
    }

    #[tokio::test]
    async fn stop_logs_out_and_destroys_the_client() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");
        registry.get_or_create(&key).await.unwrap();
        let control = factory.control(&key).unwrap();

        registry.stop(&key).await.unwrap();

        assert!(registry.get(&key).await.is_none());
        assert!(control.is_logged_out());
        assert!(control.is_destroyed());
    }

    #[tokio::test]
    async fn stop_unknown_session_fails() {
        let (registry, _) = registry();
        let result = registry.stop(&"missing".into()).await;
        assert!(matches!(result, Err(SessionError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn failed_teardown_still_removes_the_session() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");
        registry.get_or_create(&key).await.unwrap();
        factory.control(&key).unwrap().fail_teardown(true);

        registry.stop(&key).await.unwrap();

        assert!(registry.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_teardown_is_bounded() {
        let (registry, factory) = registry_with(RegistryConfig {
            teardown_timeout: Duration::from_millis(100),
            ..RegistryConfig::default()
        });
        let key = SessionKey::from("acc-1");
        registry.get_or_create(&key).await.unwrap();
        factory.control(&key).unwrap().hang_teardown(true);

        timeout(Duration::from_secs(5), registry.stop(&key))
            .await
            .expect("stop should not hang")
            .unwrap();

        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_a_hanging_teardown() {
        let (registry, factory) = registry_with(RegistryConfig {
            teardown_timeout: Duration::from_millis(100),
            ..RegistryConfig::default()
        });
        let key = SessionKey::from("acc-1");
        let (first, _) = registry.get_or_create(&key).await.unwrap();
        factory.control(&key).unwrap().hang_teardown(true);

        let stop = {
            let (registry, key) = (registry.clone(), key.clone());
            tokio::spawn(async move { registry.stop(&key).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // still registered while teardown runs
        let during = registry.get(&key).await.unwrap();
        assert!(Arc::ptr_eq(&during, &first));
        assert!(during.is_stopping());
        drop(during);

        let restart = {
            let (registry, key) = (registry.clone(), key.clone());
            tokio::spawn(async move { registry.get_or_create(&key).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(factory.created_count(), 1);
        assert!(!restart.is_finished());

        let (second, created) = restart.await.unwrap().unwrap();
        assert!(stop.is_finished());
        stop.await.unwrap().unwrap();

        assert!(created);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_stopping());
        assert_eq!(factory.created_count(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_stops_both_succeed() {
        let (registry, factory) = registry_with(RegistryConfig {
            teardown_timeout: Duration::from_millis(100),
            ..RegistryConfig::default()
        });
        let key = SessionKey::from("acc-1");
        registry.get_or_create(&key).await.unwrap();
        factory.control(&key).unwrap().hang_teardown(true);

        let (a, b) = tokio::join!(registry.stop(&key), registry.stop(&key));

        assert!(a.is_ok() && b.is_ok());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn restart_after_stop_builds_a_fresh_client() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");

        let (first, _) = registry.get_or_create(&key).await.unwrap();
        registry.stop(&key).await.unwrap();
        let (second, created) = registry.get_or_create(&key).await.unwrap();

        assert!(created);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created_count(), 2);
    }

    #[tokio::test]
    async fn session_limit_is_enforced() {
        let (registry, _) = registry_with(RegistryConfig {
            max_sessions: Some(1),
            ..RegistryConfig::default()
        });

        registry.get_or_create(&"a".into()).await.unwrap();
        // existing keys are still served at the limit
        registry.get_or_create(&"a".into()).await.unwrap();
        let result = registry.get_or_create(&"b".into()).await;

        assert!(matches!(result, Err(SessionError::TooManySessions(1))));
    }

    #[tokio::test]
    async fn queries_map_errors() {
        let (registry, factory) = registry();
        let key = SessionKey::from("acc-1");

        let missing = registry.list_conversations(&key).await;
        assert!(matches!(missing, Err(SessionError::UnknownSession(_))));

        registry.get_or_create(&key).await.unwrap();
        let control = factory.control(&key).unwrap();
        control.seed_chat(Chat {
            id: "chat-1".into(),
            name: "Alice".into(),
            phone: Some("+15550001".into()),
            last_message_at: None,
        });
        assert_eq!(registry.list_conversations(&key).await.unwrap().len(), 1);

        control.fail_queries(true);
        let failed = registry.list_messages(&key, "chat-1", 10).await;
        assert!(matches!(failed, Err(SessionError::UpstreamQueryFailure { .. })));
    }

    #[tokio::test]
    async fn shutdown_tears_down_every_session() {
        let (registry, factory) = registry();
        for key in ["a", "b", "c"] {
            registry.get_or_create(&key.into()).await.unwrap();
        }

        registry.shutdown().await;

        assert!(registry.is_empty().await);
        for key in ["a", "b", "c"] {
            assert!(factory.control(&key.into()).unwrap().is_destroyed());
        }
    }
}
