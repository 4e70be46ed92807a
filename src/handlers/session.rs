use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::{info, warn};

use crate::AppState;
use crate::models::{BootstrapResponse, ErrorResponse, JoinSessionResponse};

/// Allocate a session and hand its id to the client
pub async fn bootstrap(State(state): State<AppState>) -> Json<BootstrapResponse> {
    let session_id = state.registry.create_session().await;
    info!("Bootstrapped session {}", session_id);
    Json(BootstrapResponse { session_id })
}

/// Describe an existing session
pub async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JoinSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry.session_info(&session_id).await {
        Ok(session_info) => Ok(Json(JoinSessionResponse {
            message: "Joined session".to_string(),
            session_info,
        })),
        Err(e) => {
            warn!("Join failed for session {}: {}", session_id, e);
            Err(e.into_response_parts())
        }
    }
}
