//! Background rotation loop.

use crate::ports::RotationApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Rotate then sweep every `interval` until `shutdown` flips to `true`.
///
/// Errors are logged and the loop carries on; the next tick retries.
pub async fn rotation_task(
    manager: Arc<dyn RotationApi>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("[nr-02] Shutdown signal received");
                    return;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = manager.rotate_due().await {
                    error!(error = %e, "[nr-02] Rotation cycle failed");
                }
                if let Err(e) = manager.purge_expired().await {
                    error!(error = %e, "[nr-02] Sweep failed");
                }
            }
        }
    }
}
