use axum::{
    extract::{Path, Query, State},
    Json,
};
use chatgate_core::{parse_limit, SessionError, SessionKey};
use tracing::{error, info};
use uuid::Uuid;

use super::sessions::require_session_ref;
use super::types::{ConversationsResponse, MessagesQuery, MessagesResponse, SessionRefQuery};
use crate::{ErrorResponse, ServerState};

/// Unknown sessions are the caller's fault; anything else is logged and hidden
fn query_failure(request_id: &Uuid, key: &SessionKey, what: &str, e: SessionError) -> ErrorResponse {
    match e {
        SessionError::UnknownSession(_) => ErrorResponse::unknown_session(),
        other => {
            error!("[{}] - [{}] Failed to fetch {}: {}", request_id, key, what, other);
            ErrorResponse::internal_error(format!("Failed to fetch {}", what))
        }
    }
}

/// GET /conversations?session_ref=
pub async fn handle_list_conversations(
    State(state): State<ServerState>,
    Query(query): Query<SessionRefQuery>,
) -> Result<Json<ConversationsResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let key = require_session_ref(query.session_ref)?;
    info!("[{}] - [{}] GET /conversations", request_id, key);

    let chats = state
        .registry
        .list_conversations(&key)
        .await
        .map_err(|e| query_failure(&request_id, &key, "conversations", e))?;

    Ok(Json(ConversationsResponse {
        conversations: chats.into_iter().map(Into::into).collect(),
    }))
}

/// GET /conversations/{chat_id}/messages?session_ref=&limit=
pub async fn handle_list_messages(
    State(state): State<ServerState>,
    Path(chat_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let key = require_session_ref(query.session_ref)?;
    let limit = parse_limit(
        query.limit.as_deref(),
        state.registry.config().default_message_limit,
    );
    info!(
        "[{}] - [{}] GET /conversations/{}/messages limit={}",
        request_id, key, chat_id, limit
    );

    let messages = state
        .registry
        .list_messages(&key, &chat_id, limit)
        .await
        .map_err(|e| query_failure(&request_id, &key, "messages", e))?;

    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}
