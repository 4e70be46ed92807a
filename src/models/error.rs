use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn with_status(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        (status, Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: error.into(),
        }))
    }
}

/// Failures of the realtime sync path. Every variant is scoped to one
/// session or one connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("connection to session '{0}' rejected")]
    ConnectionRejected(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::SessionNotFound(_) | SyncError::ConnectionRejected(_) => StatusCode::NOT_FOUND,
            SyncError::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            SyncError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn into_response_parts(self) -> (StatusCode, Json<ErrorResponse>) {
        ErrorResponse::with_status(self.status_code(), self.to_string())
    }
}
