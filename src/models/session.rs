use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response of the bootstrap endpoint
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct BootstrapResponse {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Snapshot of one live session
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub code: String,
    pub peers: usize,
}

/// Response of the join endpoint
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionResponse {
    pub message: String,
    pub session_info: SessionInfo,
}
