//! Periodic stale-claim recovery sweep (§4.5): a thin timer wrapper
//! around [`TaskManager::recover_stale_tasks`], run as its own loop by
//! the worker pool so a single slow sweep never blocks task polling.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::manager::TaskManager;

pub struct RecoverySweeper {
    manager: Arc<TaskManager>,
    interval: Duration,
}

impl RecoverySweeper {
    pub fn new(manager: Arc<TaskManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Sweeps once per `interval` until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("queue_recovery_stopping");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        match self.manager.recover_stale_tasks().await {
            Ok(0) => {}
            Ok(recovered) => tracing::info!(recovered, "queue_recovery_swept"),
            Err(err) => tracing::warn!(error = %err, "queue_recovery_failed"),
        }
    }
}
