//! Periodic health monitor.
//!
//! Re-probes every registered provider on a fixed period and recomputes
//! the fallback chain. The task holds only a weak reference, so dropping
//! the manager ends it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::manager::ProviderManager;

/// Handle to a running health sweep loop.
#[derive(Debug)]
pub struct HealthMonitor {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl HealthMonitor {
    /// Spawns the loop. The first sweep runs one full period after start.
    pub fn start(manager: &Arc<ProviderManager>, interval: Duration) -> Self {
        let weak = Arc::downgrade(manager);
        let handle = tokio::spawn(run(weak, interval));
        info!(interval = ?interval, "Health monitor started");
        Self { handle, interval }
    }

    /// Sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the loop.
    pub fn stop(self) {
        self.handle.abort();
        debug!("Health monitor stopped");
    }
}

async fn run(manager: Weak<ProviderManager>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(manager) = manager.upgrade() else {
            debug!("Manager dropped, health monitor exiting");
            break;
        };
        manager.run_health_sweep().await;
    }
}
