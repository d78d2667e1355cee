use axum::{
    routing::{get, post},
    Router,
};
use chatgate_core::{ClientFactory, RegistryConfig, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::apis;

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address (e.g., "127.0.0.1:8080")
    pub address: String,
    /// Session registry configuration
    pub registry: RegistryConfig,
}

impl ServerConfig {
    /// Create a new server config with the given address and default registry config
    pub fn new(address: String) -> Self {
        Self {
            address,
            registry: RegistryConfig::default(),
        }
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.registry.max_sessions = max_sessions;
        self
    }

    /// Bound each teardown step (logout, destroy) when a session stops
    pub fn with_teardown_timeout(mut self, teardown_timeout: Duration) -> Self {
        self.registry.teardown_timeout = teardown_timeout;
        self
    }

    /// Set the message count used when `limit` is missing or invalid
    pub fn with_default_message_limit(mut self, limit: usize) -> Self {
        self.registry.default_message_limit = limit;
        self
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Server state holding the session registry
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<SessionRegistry>,
}

impl ServerState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

/// Build the application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(apis::handle_health))
        // Session lifecycle
        .route("/sessions", get(apis::handle_list_sessions))
        .route("/sessions/start", post(apis::handle_start_session))
        .route("/sessions/stop", post(apis::handle_stop_session))
        .route("/sessions/status", get(apis::handle_session_status))
        .route("/sessions/{session_ref}/qr", get(apis::handle_session_qr))
        .route("/sessions/{session_ref}/events", get(apis::handle_session_events))
        // Read access to the live client
        .route("/conversations", get(apis::handle_list_conversations))
        .route("/conversations/{chat_id}/messages", get(apis::handle_list_messages))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Start the HTTP server. Sessions are torn down once the server stops.
pub async fn start_server(
    config: ServerConfig,
    factory: Arc<dyn ClientFactory>,
) -> Result<(), ServerError> {
    // Create session registry
    let registry = Arc::new(SessionRegistry::new(factory, config.registry.clone()));

    println!("✓ Session registry initialized");
    if let Some(max) = config.registry.max_sessions {
        println!("  Max sessions: \x1b[1m{}\x1b[0m", max);
    } else {
        println!("  Max sessions: \x1b[1munlimited\x1b[0m");
    }
    println!("  Teardown timeout: \x1b[1m{:?}\x1b[0m", config.registry.teardown_timeout);
    println!();

    let state = ServerState::new(registry.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .map_err(|source| ServerError::Bind {
            address: config.address.clone(),
            source,
        })?;

    // Print server info
    println!("Server starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mPOST /sessions/start\x1b[0m                        - Start or reuse a session");
    println!("  \x1b[1mPOST /sessions/stop\x1b[0m                         - Stop a session");
    println!("  \x1b[1mGET  /sessions/status?session_ref=\x1b[0m          - Session status");
    println!("  \x1b[1mGET  /sessions/:ref/qr\x1b[0m                      - Pending QR code");
    println!("  \x1b[1mGET  /sessions/:ref/events\x1b[0m                  - Session updates (SSE)");
    println!("  \x1b[1mGET  /sessions\x1b[0m                              - List sessions");
    println!("  \x1b[1mGET  /conversations?session_ref=\x1b[0m            - List conversations");
    println!("  \x1b[1mGET  /conversations/:id/messages?session_ref=\x1b[0m - List messages");
    println!("\nPress Ctrl+C to stop\n");

    info!("HTTP server listening on {}", config.address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registry.shutdown().await;
    served?;
    Ok(())
}
