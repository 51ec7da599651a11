//! Background Expiry Sweeper
//!
//! The column store drops expired rows on its own, independently of any
//! request. [`MemoryStore`] reproduces that with this task: it wakes up on an
//! interval and purges every row whose deadline has passed. Reads already
//! hide expired rows, so the sweeper only reclaims memory.
//!
//! The interval adapts: a sweep that removes a large share of rows halves it,
//! an empty sweep doubles it, both within `[min_interval, max_interval]`.

use crate::storage::memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    pub base_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Share of rows purged in one sweep above which sweeping speeds up.
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

/// Handle to the running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    pub fn start(store: Arc<MemoryStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(store, config, shutdown_rx));
        debug!("expiry sweeper started");
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<MemoryStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper stopped");
                    return;
                }
            }
        }

        let rows_before = store.len();
        let purged = store.purge_expired();

        if rows_before > 0 && purged as f64 / rows_before as f64 > config.speedup_threshold {
            interval = (interval / 2).max(config.min_interval);
        } else if purged == 0 {
            interval = (interval * 2).min(config.max_interval);
        }

        if purged > 0 {
            debug!(
                purged,
                total_purged = store.expired_count(),
                rows_remaining = store.len(),
                next_sweep_ms = interval.as_millis() as u64,
                "purged expired rows"
            );
        } else {
            trace!(next_sweep_ms = interval.as_millis() as u64, "nothing to purge");
        }
    }
}

/// Starts the sweeper with the default configuration.
pub fn start_expiry_sweeper(store: Arc<MemoryStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}
