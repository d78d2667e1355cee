use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::KeepAlive, IntoResponse, Response, Sse},
    Json,
};
use chatgate_core::SessionKey;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::types::{
    HealthResponse, OkResponse, QrResponse, SessionListResponse, SessionRefQuery,
    SessionStatusResponse, SessionSummary, StartSessionRequest, StopSessionRequest,
};
use crate::{session_to_sse_stream, ApiJsonOrDefault, ErrorResponse, ServerState};

/// A missing or empty `session_ref` can never match a registered session
pub(crate) fn require_session_ref(session_ref: Option<String>) -> Result<SessionKey, ErrorResponse> {
    session_ref
        .filter(|r| !r.is_empty())
        .map(SessionKey::from)
        .ok_or_else(ErrorResponse::unknown_session)
}

/// POST /sessions/start - start (or reuse) a session
pub async fn handle_start_session(
    State(state): State<ServerState>,
    ApiJsonOrDefault(payload): ApiJsonOrDefault<StartSessionRequest>,
) -> Result<Json<SessionStatusResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let key = SessionKey::resolve(
        payload.session_ref.as_deref(),
        payload.account_id.as_deref(),
        Utc::now(),
    );
    info!("[{}] - [{}] POST /sessions/start", request_id, key);

    let (record, created) = state.registry.get_or_create(&key).await?;
    if !created {
        info!("[{}] - [{}] Session already running", request_id, key);
    }

    Ok(Json(SessionStatusResponse::new(&key, record.status())))
}

/// POST /sessions/stop - log out, release the client and forget the session
pub async fn handle_stop_session(
    State(state): State<ServerState>,
    ApiJsonOrDefault(payload): ApiJsonOrDefault<StopSessionRequest>,
) -> Result<Json<OkResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let key = require_session_ref(payload.session_ref)?;
    info!("[{}] - [{}] POST /sessions/stop", request_id, key);

    state.registry.stop(&key).await?;

    Ok(Json(OkResponse { ok: true }))
}

/// GET /sessions/status?session_ref=
pub async fn handle_session_status(
    State(state): State<ServerState>,
    Query(query): Query<SessionRefQuery>,
) -> Result<Json<SessionStatusResponse>, ErrorResponse> {
    let key = require_session_ref(query.session_ref)?;
    let record = state
        .registry
        .get(&key)
        .await
        .ok_or_else(ErrorResponse::unknown_session)?;

    Ok(Json(SessionStatusResponse::new(&key, record.status())))
}

/// GET /sessions/{session_ref}/qr - pending QR payload, or 204 when there is none
pub async fn handle_session_qr(
    State(state): State<ServerState>,
    Path(session_ref): Path<String>,
) -> Response {
    let key = SessionKey::from(session_ref);
    let qr = state
        .registry
        .get(&key)
        .await
        .and_then(|record| record.pending_credential());

    match qr {
        Some(qr) => Json(QrResponse { qr }).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /sessions - every registered session with its full lifecycle state
pub async fn handle_list_sessions(State(state): State<ServerState>) -> Json<SessionListResponse> {
    let sessions = state
        .registry
        .list()
        .await
        .iter()
        .map(|record| SessionSummary::from(record.as_ref()))
        .collect();

    Json(SessionListResponse { sessions })
}

/// GET /sessions/{session_ref}/events - SSE feed of session changes
pub async fn handle_session_events(
    State(state): State<ServerState>,
    Path(session_ref): Path<String>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let key = SessionKey::from(session_ref);
    let snapshot_rx = state
        .registry
        .get(&key)
        .await
        .ok_or_else(ErrorResponse::unknown_session)?
        .subscribe();
    info!("[{}] - [{}] GET /sessions/{{ref}}/events", request_id, key);

    let stream = session_to_sse_stream(key, snapshot_rx);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response())
}

/// GET /health
pub async fn handle_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        sessions: state.registry.len().await,
    })
}
