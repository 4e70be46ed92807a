use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::registry::SessionRegistry;

/// Periodically evict sessions that have had no peers for `grace`.
pub fn spawn_reaper(registry: Arc<SessionRegistry>, interval: Duration, grace: Duration) -> JoinHandle<()> {
    info!("Session reaper running every {:?}, grace {:?}", interval, grace);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(Instant::now(), grace).await;
            if evicted.is_empty() {
                debug!("Reaper tick: nothing to evict");
            } else {
                info!("Evicted {} idle session(s): {:?}", evicted.len(), evicted);
            }
        }
    })
}
