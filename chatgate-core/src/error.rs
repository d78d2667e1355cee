use thiserror::Error;

/// Errors raised by a messaging client implementation
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Client is not connected")]
    NotConnected,

    #[error("Client has been destroyed")]
    Destroyed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Errors raised by the session registry
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Maximum number of sessions reached: {0}")]
    TooManySessions(usize),

    #[error("Upstream query failed for session {key}: {source}")]
    UpstreamQueryFailure {
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("Teardown failed for session {key}: {reason}")]
    TeardownFailure { key: String, reason: String },
}
