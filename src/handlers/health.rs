use axum::{extract::State, Json};
use chrono::Utc;
use tracing::debug;

use crate::AppState;
use crate::models::HealthResponse;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
        service: state.config.service_name.clone(),
        date: Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    // The registry lives in memory; once the router is serving it is usable.
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
        service: state.config.service_name.clone(),
        date: Utc::now().to_rfc3339(),
    })
}
