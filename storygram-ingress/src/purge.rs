//! Background removal of expired stories

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use storygram_store::StoryStore;

/// Purge expired stories every `interval` until `shutdown` fires.
///
/// Store errors are logged and the next tick tries again.
#[must_use]
pub fn spawn_purge_task(
    store: Arc<dyn StoryStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => debug!("No expired stories"),
                        Ok(purged) => info!(purged, "Purged expired stories"),
                        Err(e) => warn!(error = %e, "Story purge failed"),
                    }
                }
            }
        }
        debug!("Purge task stopped");
    })
}
