use utoipa::OpenApi;
use crate::models::*;

/// Bootstrap a session
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "New session allocated", body = BootstrapResponse)
    )
)]
#[allow(dead_code)]
pub async fn bootstrap_doc() {}

/// Look up a session
#[utoipa::path(
    get,
    path = "/session/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session identifier returned by bootstrap")
    ),
    responses(
        (status = 200, description = "Session exists", body = JoinSessionResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn join_session_doc() {}

/// Realtime channel. Frames are `{"code": "..."}` in both directions.
#[utoipa::path(
    get,
    path = "/live/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session to attach to")
    ),
    responses(
        (status = 101, description = "Switched to WebSocket"),
        (status = 404, description = "Unknown session, upgrade refused", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn live_doc() {}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Session and host counters", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        bootstrap_doc,
        join_session_doc,
        live_doc,
        health_check_doc,
        diagnostics_doc,
    ),
    components(
        schemas(BootstrapResponse, JoinSessionResponse, SessionInfo, CodeMessage, HealthResponse, DiagnosticsResponse, ErrorResponse)
    ),
    tags(
        (name = "sharecode", description = "Session bootstrap and live sync")
    )
)]
pub struct ApiDoc;
