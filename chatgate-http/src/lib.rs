pub mod apis;
pub mod error;
pub mod http;
pub mod streaming;

pub use error::{ApiJsonOrDefault, ErrorResponse, UNKNOWN_SESSION};
pub use http::{router, start_server, ServerConfig, ServerError, ServerState};
pub use streaming::session_to_sse_stream;
