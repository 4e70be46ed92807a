use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SyncError;

/// The one frame shape on `/live/{sessionID}`, in both directions: the
/// complete current document.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct CodeMessage {
    pub code: String,
}

impl CodeMessage {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn encode(&self) -> String {
        // A struct with a single String field always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"code\":\"\"}"))
    }
}

/// What a decoded frame asks the server to do with the session document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    /// Replace the whole document, last writer wins.
    FullReplace(String),
}

impl SyncUpdate {
    pub fn decode(payload: &str) -> Result<Self, SyncError> {
        serde_json::from_str::<CodeMessage>(payload)
            .map(|msg| SyncUpdate::FullReplace(msg.code))
            .map_err(|e| SyncError::MalformedMessage(e.to_string()))
    }

    pub fn decode_bytes(payload: &[u8]) -> Result<Self, SyncError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| SyncError::MalformedMessage(e.to_string()))?;
        Self::decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_document_frames() {
        let update = SyncUpdate::decode(r#"{"code":"SELECT 1"}"#).unwrap();
        assert_eq!(update, SyncUpdate::FullReplace("SELECT 1".to_string()));
    }

    #[test]
    fn rejects_frames_without_code() {
        for payload in [r#"{}"#, r#"{"code":5}"#, "not json", r#"["SELECT 1"]"#] {
            match SyncUpdate::decode(payload) {
                Err(SyncError::MalformedMessage(_)) => {}
                other => panic!("expected MalformedMessage for {payload}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_invalid_utf8_binary_frames() {
        assert!(matches!(
            SyncUpdate::decode_bytes(&[0xff, 0xfe]),
            Err(SyncError::MalformedMessage(_))
        ));
        assert!(SyncUpdate::decode_bytes(br#"{"code":"x"}"#).is_ok());
    }

    #[test]
    fn encodes_with_single_code_field() {
        let text = CodeMessage::new("a \"quoted\" line\n").encode();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, serde_json::json!({ "code": "a \"quoted\" line\n" }));
    }
}
