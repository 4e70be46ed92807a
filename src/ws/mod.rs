pub mod connctx;
pub mod reaper;
pub mod registry;

pub use connctx::{ConnState, PeerConnection, PeerHandle};
pub use registry::{ConnectionId, PeerReceiver, RegistryStats, SessionRegistry};
