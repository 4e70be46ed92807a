use tracing::{info, warn};

use crate::config::SyncSettings;
use crate::models::SyncError;
use crate::ws::{PeerConnection, SessionRegistry};

/// Attach a new connection to `session_id`'s peer set.
///
/// Unknown sessions are rejected unless `auto_create_sessions` is set, in
/// which case the session is created under the requested id. On success the
/// connection is `Open`; when replay is enabled its outbound slot already
/// holds the current document.
pub async fn open_connection(
    registry: &SessionRegistry,
    session_id: &str,
    settings: &SyncSettings,
) -> Result<PeerConnection, SyncError> {
    if settings.auto_create_sessions {
        registry.ensure_session(session_id).await;
    }

    let (mut conn, sender) = PeerConnection::new(session_id);
    match registry.attach(session_id, conn.id(), sender, settings.replay_on_join).await {
        Ok(replayed) => {
            conn.mark_open();
            info!(
                "Connection {} open on session {} (replayed: {})",
                conn.id(), session_id, replayed
            );
            Ok(conn)
        }
        Err(SyncError::SessionNotFound(_)) => {
            conn.mark_closed();
            warn!("Rejected connection to unknown session {}", session_id);
            Err(SyncError::ConnectionRejected(session_id.to_string()))
        }
        Err(e) => {
            conn.mark_closed();
            Err(e)
        }
    }
}

/// Remove `conn` from its session. Idempotent.
pub async fn close_connection(registry: &SessionRegistry, conn: &mut PeerConnection) -> bool {
    conn.close(registry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::ConnState;

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let registry = SessionRegistry::new();
        let err = open_connection(&registry, "nope", &SyncSettings::default()).await.unwrap_err();
        assert_eq!(err, SyncError::ConnectionRejected("nope".to_string()));
        assert!(!registry.contains("nope").await);
    }

    #[tokio::test]
    async fn auto_create_opens_unknown_session() {
        let registry = SessionRegistry::new();
        let settings = SyncSettings {
            auto_create_sessions: true,
            ..SyncSettings::default()
        };
        let conn = open_connection(&registry, "abc123", &settings).await.unwrap();
        assert_eq!(conn.state(), ConnState::Open);
        assert_eq!(registry.peer_count("abc123").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn open_then_double_close() {
        let registry = SessionRegistry::new();
        let id = registry.create_session().await;

        let mut conn = open_connection(&registry, &id, &SyncSettings::default()).await.unwrap();
        assert_eq!(conn.state(), ConnState::Open);
        assert_eq!(registry.peer_count(&id).await.unwrap(), 1);

        assert!(close_connection(&registry, &mut conn).await);
        assert!(!close_connection(&registry, &mut conn).await);
        assert_eq!(conn.state(), ConnState::Closed);
        assert_eq!(registry.peer_count(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replayed_document_waits_in_the_slot() {
        let registry = SessionRegistry::new();
        let id = registry.create_session().await;
        registry.set_document(&id, "SELECT 1").await.unwrap();

        let mut conn = open_connection(&registry, &id, &SyncSettings::default()).await.unwrap();
        let mut outbound = conn.take_outbound().unwrap();
        outbound.changed().await.unwrap();
        assert_eq!(&**outbound.borrow_and_update(), r#"{"code":"SELECT 1"}"#);
        assert!(conn.take_outbound().is_none());
    }
}
