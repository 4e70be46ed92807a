use tracing::debug;
use uuid::Uuid;

use super::registry::{peer_channel, ConnectionId, PeerReceiver, PeerSender, SessionRegistry};

/// Lifecycle of a realtime connection. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
}

/// What the broadcaster needs to know about the peer a frame came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    pub id: ConnectionId,
    pub session_id: String,
}

/// One client's channel, bound to exactly one session for its lifetime.
#[derive(Debug)]
pub struct PeerConnection {
    id: ConnectionId,
    session_id: String,
    state: ConnState,
    outbound: Option<PeerReceiver>,
}

impl PeerConnection {
    /// A connection in `Connecting`, plus the frame slot the registry
    /// keeps for it.
    pub fn new(session_id: impl Into<String>) -> (Self, PeerSender) {
        let (tx, rx) = peer_channel();
        let conn = Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            state: ConnState::Connecting,
            outbound: Some(rx),
        };
        (conn, tx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn handle(&self) -> PeerHandle {
        PeerHandle {
            id: self.id,
            session_id: self.session_id.clone(),
        }
    }

    pub(crate) fn mark_open(&mut self) {
        if self.state == ConnState::Connecting {
            self.state = ConnState::Open;
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = ConnState::Closed;
    }

    /// Hand the outbound slot to the socket writer. Only the first call
    /// gets it.
    pub fn take_outbound(&mut self) -> Option<PeerReceiver> {
        self.outbound.take()
    }

    /// Leave the session. Safe to call any number of times; only the first
    /// call touches the peer set.
    pub async fn close(&mut self, registry: &SessionRegistry) -> bool {
        if self.state == ConnState::Closed {
            return false;
        }
        self.state = ConnState::Closed;
        self.outbound = None;
        let removed = registry.detach(&self.session_id, self.id).await;
        debug!("Connection {} closed (removed: {})", self.id, removed);
        removed
    }
}
