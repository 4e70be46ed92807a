use axum::{
    extract::{Path, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::models::SyncError;
use crate::utils::scope_guard::ScopeGuard;
use crate::websocket::gateway::open_connection;
use crate::websocket::msg_update_handler::{handle_update_bytes, handle_update_message};
use crate::ws::PeerReceiver;

/// WebSocket handler for `/live/{session_id}`
pub async fn websocket_handler(
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    info!("New WebSocket connection attempt for session {}", session_id);

    // Refuse the upgrade outright so the client never sees an open socket.
    if !state.settings.auto_create_sessions && !state.registry.contains(&session_id).await {
        warn!("Upgrade refused, unknown session {}", session_id);
        return SyncError::ConnectionRejected(session_id).into_response_parts().into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Handle WebSocket connection
async fn handle_socket(mut socket: WebSocket, session_id: String, state: AppState) {
    let registry = state.registry.clone();
    let settings = state.settings;

    // The session may have been evicted between the check and the upgrade.
    let mut conn = match open_connection(&registry, &session_id, &settings).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Failed to open connection: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let peer = conn.handle();

    // If this future is dropped mid-flight the peer set must still shrink.
    let guard_registry = registry.clone();
    let guard_peer = peer.clone();
    let cleanup = ScopeGuard::new(move || {
        tokio::spawn(async move {
            guard_registry.detach(&guard_peer.session_id, guard_peer.id).await;
        });
    });

    let Some(outbound) = conn.take_outbound() else {
        error!("Outbound slot for connection {} already taken", peer.id);
        return;
    };

    let (sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(forward_frames(outbound, sender, settings.send_timeout));

    // Read frames from the client and hand them to the broadcaster
    let reader_registry = registry.clone();
    let reader_peer = peer.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let outcome = match result {
                Ok(Message::Text(text)) => handle_update_message(&reader_registry, &reader_peer, &text).await,
                Ok(Message::Binary(bytes)) => handle_update_bytes(&reader_registry, &reader_peer, &bytes).await,
                Ok(Message::Close(_)) => break,
                // ping/pong are answered by axum
                Ok(_) => continue,
                Err(e) => return Some(SyncError::TransportFailure(e.to_string())),
            };
            match outcome {
                Ok(_) | Err(SyncError::MalformedMessage(_)) => {}
                Err(e) => return Some(e),
            }
        }
        None
    });

    // Wait for either task to finish (and finish the other)
    let finished = tokio::select! {
        res = (&mut send_task) => { recv_task.abort(); res }
        res = (&mut recv_task) => { send_task.abort(); res }
    };

    match finished {
        Ok(None) => debug!("Connection {} ended cleanly", peer.id),
        Ok(Some(e)) => warn!("Connection {} ended: {}", peer.id, e),
        Err(e) => error!("Connection task for {} failed: {}", peer.id, e),
    }

    cleanup.dismiss();
    conn.close(&registry).await;
    info!("WebSocket connection {} on session {} terminated", peer.id, session_id);
}

/// Write each new frame from `outbound` to `sink`, every write bounded by
/// `send_timeout`. Returns the failure that ended the writer, or `None` once
/// the registry let go of the peer.
pub(crate) async fn forward_frames<S>(
    mut outbound: PeerReceiver,
    mut sink: S,
    send_timeout: Duration,
) -> Option<SyncError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while outbound.changed().await.is_ok() {
        let frame = outbound.borrow_and_update().clone();
        match timeout(send_timeout, sink.send(Message::Text(frame.to_string()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Some(SyncError::TransportFailure(e.to_string())),
            Err(_) => {
                return Some(SyncError::TransportFailure(format!(
                    "send timed out after {:?}",
                    send_timeout
                )))
            }
        }
    }
    let _ = sink.close().await;
    None
}
