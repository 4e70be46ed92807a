use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CodeMessage, SessionInfo, SyncError, SyncUpdate};

pub type ConnectionId = Uuid;

/// Encoded outbound frame, shared between every recipient of one update.
pub type Frame = Arc<str>;

/// Latest frame slot feeding one peer's socket writer. Every frame carries
/// the whole document, so a writer that falls behind skips to the newest.
pub type PeerSender = watch::Sender<Frame>;

pub type PeerReceiver = watch::Receiver<Frame>;

/// A fresh slot. The placeholder value counts as already seen.
pub fn peer_channel() -> (PeerSender, PeerReceiver) {
    watch::channel(Frame::from(""))
}

#[derive(Debug)]
struct SessionState {
    code: String,
    peers: HashMap<ConnectionId, PeerSender>,
    /// Set while the peer set is empty.
    idle_since: Option<Instant>,
    /// Set under the lock by the reaper; a removed session accepts nothing.
    evicted: bool,
}

/// One collaboration context: the authoritative document plus its peers.
#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(id: String, code: String) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                code,
                peers: HashMap::new(),
                idle_since: Some(Instant::now()),
                evicted: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Counters reported by the diagnostics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub sessions: usize,
    pub connections: usize,
    pub idle_sessions: usize,
}

/// Maps session ids to their live state.
///
/// The map lock is only held to look up, insert or remove sessions. All
/// mutation of a session's document and peer set happens under that
/// session's own mutex, so sessions never contend with each other.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    initial_document: String,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_document(initial_document: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            initial_document: initial_document.into(),
        }
    }

    /// Allocate a session with a fresh id and the initial document.
    pub async fn create_session(&self) -> String {
        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = Uuid::new_v4().simple().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        sessions.insert(id.clone(), Arc::new(Session::new(id.clone(), self.initial_document.clone())));
        info!("Created session {} ({} live)", id, sessions.len());
        id
    }

    /// Return the session under `id`, creating it when absent.
    pub async fn ensure_session(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!("Created session {} on demand", id);
                Arc::new(Session::new(id.to_string(), self.initial_document.clone()))
            })
            .clone()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    async fn session(&self, id: &str) -> Result<Arc<Session>, SyncError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))
    }

    pub async fn get_document(&self, id: &str) -> Result<String, SyncError> {
        let session = self.session(id).await?;
        let state = session.state.lock().await;
        if state.evicted {
            return Err(SyncError::SessionNotFound(id.to_string()));
        }
        Ok(state.code.clone())
    }

    /// Replace the stored document. No history is kept.
    pub async fn set_document(&self, id: &str, code: impl Into<String>) -> Result<(), SyncError> {
        let session = self.session(id).await?;
        let mut state = session.state.lock().await;
        if state.evicted {
            return Err(SyncError::SessionNotFound(id.to_string()));
        }
        state.code = code.into();
        Ok(())
    }

    pub async fn session_info(&self, id: &str) -> Result<SessionInfo, SyncError> {
        let session = self.session(id).await?;
        let state = session.state.lock().await;
        if state.evicted {
            return Err(SyncError::SessionNotFound(id.to_string()));
        }
        Ok(SessionInfo {
            session_id: session.id.clone(),
            code: state.code.clone(),
            peers: state.peers.len(),
        })
    }

    pub async fn peer_count(&self, id: &str) -> Result<usize, SyncError> {
        self.session_info(id).await.map(|info| info.peers)
    }

    /// Add a connection to the session's peer set.
    ///
    /// With `replay` the current document is put in the new peer's slot
    /// inside the same critical section, so a later broadcast can only
    /// supersede it. Returns whether a replay frame was queued.
    pub async fn attach(
        &self,
        id: &str,
        conn_id: ConnectionId,
        sender: PeerSender,
        replay: bool,
    ) -> Result<bool, SyncError> {
        let session = self.session(id).await?;
        let mut state = session.state.lock().await;
        if state.evicted {
            return Err(SyncError::SessionNotFound(id.to_string()));
        }

        if replay {
            sender.send_replace(encode_frame(&state.code));
        }
        state.peers.insert(conn_id, sender);
        state.idle_since = None;
        debug!("Connection {} joined session {} ({} peers)", conn_id, id, state.peers.len());
        Ok(replay)
    }

    /// Remove a connection from the session's peer set. Returns `true` only
    /// for the call that actually removed it.
    pub async fn detach(&self, id: &str, conn_id: ConnectionId) -> bool {
        let Ok(session) = self.session(id).await else {
            return false;
        };
        let mut state = session.state.lock().await;
        let removed = state.peers.remove(&conn_id).is_some();
        if removed {
            debug!("Connection {} left session {} ({} peers)", conn_id, id, state.peers.len());
            if state.peers.is_empty() {
                state.idle_since = Some(Instant::now());
            }
        }
        removed
    }

    /// Store the update and queue it to every peer but `from`.
    ///
    /// The frame replaces whatever is pending in each peer's slot, inside the
    /// session lock. Peers observe updates in apply order, a lagging peer
    /// skips straight to the newest document, and nothing here waits on a
    /// socket. Returns the number of live peers the frame was handed to.
    pub async fn apply_update(
        &self,
        id: &str,
        from: ConnectionId,
        update: SyncUpdate,
    ) -> Result<usize, SyncError> {
        let session = self.session(id).await?;
        let mut state = session.state.lock().await;
        if state.evicted {
            return Err(SyncError::SessionNotFound(id.to_string()));
        }

        match update {
            SyncUpdate::FullReplace(code) => state.code = code,
        }

        let frame = encode_frame(&state.code);
        let mut delivered = 0;
        for (peer_id, sender) in state.peers.iter() {
            if *peer_id == from {
                continue;
            }
            match sender.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => debug!("Connection {} in session {} already closed", peer_id, id),
            }
        }
        Ok(delivered)
    }

    /// Drop every session whose peer set has been empty for at least `grace`.
    ///
    /// Sessions are checked and flagged under their own lock with the map
    /// unlocked; the map write lock is only taken to remove flagged ones.
    pub async fn evict_idle(&self, now: Instant, grace: Duration) -> Vec<String> {
        let candidates: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut flagged = Vec::new();
        for session in candidates {
            let mut state = session.state.lock().await;
            let expired = !state.evicted
                && state.peers.is_empty()
                && state
                    .idle_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= grace);
            if expired {
                state.evicted = true;
                flagged.push(session.clone());
            }
        }
        if flagged.is_empty() {
            return Vec::new();
        }

        let mut sessions = self.sessions.write().await;
        flagged
            .into_iter()
            .map(|session| {
                if sessions.get(&session.id).is_some_and(|current| Arc::ptr_eq(current, &session)) {
                    sessions.remove(&session.id);
                }
                session.id.clone()
            })
            .collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut stats = RegistryStats {
            sessions: sessions.len(),
            ..Default::default()
        };
        for session in sessions {
            let state = session.state.lock().await;
            stats.connections += state.peers.len();
            if state.peers.is_empty() {
                stats.idle_sessions += 1;
            }
        }
        stats
    }
}

fn encode_frame(code: &str) -> Frame {
    Arc::from(CodeMessage::new(code).encode())
}
