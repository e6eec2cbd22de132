//! TTL Cleanup Task
//!
//! Background task that periodically reclaims expired cache entries nobody
//! reads again.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;

// == Cleanup Handle ==
/// Handle to a running cleanup task.
///
/// Call [`CleanupHandle::shutdown`] to stop the task between sweeps and wait
/// for it, or [`CleanupHandle::abort`] to cancel it immediately. Dropping
/// the handle also stops the task at its next wakeup.
#[derive(Debug)]
pub struct CleanupHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signals the task to stop and waits for it to exit.
    pub async fn shutdown(self) {
        // Errs only if the task already exited
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.join.await {
            if !err.is_cancelled() {
                warn!("Cleanup task ended abnormally: {}", err);
            }
        }
    }

    /// Cancels the task without waiting.
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawns a background task that periodically cleans up expired entries.
///
/// The task sleeps for the interval between runs and takes the store's
/// write lock only for the sweep itself.
///
/// # Arguments
/// * `engine` - Engine whose store is swept
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Example
/// ```ignore
/// let engine = Engine::new();
/// let cleanup = spawn_cleanup_task(engine.clone(), 1);
/// // Later, during shutdown:
/// cleanup.shutdown().await;
/// ```
pub fn spawn_cleanup_task(engine: Engine, cleanup_interval_secs: u64) -> CleanupHandle {
    spawn_cleanup_task_every(engine, Duration::from_secs(cleanup_interval_secs))
}

/// Same as [`spawn_cleanup_task`] with a sub-second interval.
pub fn spawn_cleanup_task_every(engine: Engine, interval: Duration) -> CleanupHandle {
    // tokio intervals panic on zero
    let interval = interval.max(Duration::from_millis(1));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = engine.sweep_expired().await;
                    if removed > 0 {
                        info!("TTL cleanup: removed {} expired entries", removed);
                    } else {
                        debug!("TTL cleanup: no expired entries found");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("TTL cleanup task stopped");
    });

    CleanupHandle { shutdown_tx, join }
}
