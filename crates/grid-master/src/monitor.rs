//! Heartbeat monitor: periodic sweep evicting stale registry entries.
//!
//! Eviction is a registry-only operation. Tasks already dispatched to an
//! evicted worker are not failed or reassigned; they run to their own
//! timeout in the dispatcher (documented non-goal).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::MasterConfig;
use crate::registry::WorkerRegistry;

/// Run the sweep loop until the shutdown signal flips.
pub async fn run(
    registry: Arc<WorkerRegistry>,
    config: MasterConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep(&registry, &config).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("heartbeat monitor stopping");
                    return;
                }
            }
        }
    }
}

/// One sweep: collect stale workers under the lock, close them outside it.
async fn sweep(registry: &WorkerRegistry, config: &MasterConfig) {
    let stale = registry.take_stale(config.heartbeat_timeout);
    for worker in stale {
        warn!(
            worker_id = %worker.worker_id(),
            age_ms = worker.last_seen_age().as_millis() as u64,
            "worker failed heartbeat check, evicting"
        );
        worker.session().close().await;
    }
}
