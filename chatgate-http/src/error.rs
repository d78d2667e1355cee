use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chatgate_core::SessionError;
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

/// Message returned whenever a request names a session that is not registered
pub const UNKNOWN_SESSION: &str = "Unknown session_ref";

/// Error body returned by every endpoint: `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    status: StatusCode,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: message.into(),
        }
    }

    pub fn unknown_session() -> Self {
        Self::new(StatusCode::BAD_REQUEST, UNKNOWN_SESSION)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Upstream causes are logged here and never echoed to the caller
impl From<SessionError> for ErrorResponse {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::UnknownSession(_) => ErrorResponse::unknown_session(),
            SessionError::TooManySessions(_) => ErrorResponse::unavailable(e.to_string()),
            SessionError::UpstreamQueryFailure { .. } | SessionError::TeardownFailure { .. } => {
                error!("{}", e);
                ErrorResponse::internal_error("Internal error")
            }
        }
    }
}

/// JSON body whose fields are all optional. An empty body, with or without
/// a content type, stands for `T::default()`.
pub struct ApiJsonOrDefault<T>(pub T);

impl<T, S> FromRequest<S> for ApiJsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ErrorResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ErrorResponse::invalid_request(rejection.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&body).map(Self).map_err(|e| {
            error!("JSON deserialization error: {}", e);
            ErrorResponse::invalid_request(format!("Failed to parse the request body as JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_status_codes() {
        let unknown: ErrorResponse = SessionError::UnknownSession("x".into()).into();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown.error, UNKNOWN_SESSION);

        let full: ErrorResponse = SessionError::TooManySessions(3).into();
        assert_eq!(full.status(), StatusCode::SERVICE_UNAVAILABLE);

        let teardown: ErrorResponse = SessionError::TeardownFailure {
            key: "x".into(),
            reason: "logout failed".into(),
        }
        .into();
        assert_eq!(teardown.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!teardown.error.contains("logout"));
    }

    #[test]
    fn body_has_only_the_error_field() {
        let body = serde_json::to_value(ErrorResponse::unknown_session()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Unknown session_ref" }));
    }
}
