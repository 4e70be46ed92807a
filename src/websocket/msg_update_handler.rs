use tracing::{debug, warn};

use crate::models::{SyncError, SyncUpdate};
use crate::ws::{PeerHandle, SessionRegistry};

/// Handle a text frame from `peer`: decode, store as the session document,
/// relay to every other peer. Returns how many peers the frame was handed to.
///
/// A frame that does not decode is dropped without touching the document;
/// the caller keeps the connection open.
pub async fn handle_update_message(
    registry: &SessionRegistry,
    peer: &PeerHandle,
    payload: &str,
) -> Result<usize, SyncError> {
    let update = SyncUpdate::decode(payload).inspect_err(|e| {
        warn!("Dropping frame from {} in session {}: {}", peer.id, peer.session_id, e);
    })?;
    apply(registry, peer, update).await
}

/// Binary variant of [`handle_update_message`]; the bytes must be UTF-8 JSON.
pub async fn handle_update_bytes(
    registry: &SessionRegistry,
    peer: &PeerHandle,
    payload: &[u8],
) -> Result<usize, SyncError> {
    let update = SyncUpdate::decode_bytes(payload).inspect_err(|e| {
        warn!("Dropping binary frame from {} in session {}: {}", peer.id, peer.session_id, e);
    })?;
    apply(registry, peer, update).await
}

async fn apply(registry: &SessionRegistry, peer: &PeerHandle, update: SyncUpdate) -> Result<usize, SyncError> {
    let delivered = registry.apply_update(&peer.session_id, peer.id, update).await?;
    debug!("Update from {} in session {} relayed to {} peer(s)", peer.id, peer.session_id, delivered);
    Ok(delivered)
}
