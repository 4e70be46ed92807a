use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness / readiness payload
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub service: String,
    /// RFC 3339 server time
    pub date: String,
}
