use super::state::AppState;
use crate::relay::{new_session_id, MessageRequest, MessageResponse, FALLBACK_REPLY};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /message
/// Forward a transcript to the dialog agent under a fresh session
pub async fn post_message(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: MessageRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            warn!("Rejecting malformed message body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid message body: {}", e),
                }),
            )
                .into_response();
        }
    };

    let session_id = new_session_id();
    info!("Relaying message (session {})", session_id);

    match state
        .agent
        .detect_intent(&session_id, &request.message)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(MessageResponse { reply })).into_response(),
        Err(e) => {
            error!("Dialog agent error: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse {
                    reply: FALLBACK_REPLY.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Any non-POST request on a message route
pub async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
