//! Worker pool: `maxConcurrent` polling workers plus a recovery sweeper,
//! with idempotent `start`/`stop` (§6.3).
//!
//! Grounded in the teacher's `ReconnectManager`/`CancellationManager`
//! shapes: a `parking_lot`-guarded state enum holds the live
//! `CancellationToken` and task handles, and each spawned loop captures
//! its own clone of that token at spawn time rather than reading it back
//! out of shared state on every tick — so a `Stop` followed immediately
//! by a `Start` can never deliver the old stop signal to the new
//! generation of workers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::manager::TaskManager;
use crate::processor::Processor;
use crate::recovery::RecoverySweeper;

enum PoolState {
    Stopped,
    Running {
        token: CancellationToken,
        handles: Vec<JoinHandle<()>>,
    },
}

/// Owns the worker loops. `start`/`stop` are idempotent: calling `start`
/// while already running, or `stop` while already stopped, is a no-op.
pub struct WorkerPool {
    manager: Arc<TaskManager>,
    processor: Arc<Processor>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn new(manager: Arc<TaskManager>, processor: Arc<Processor>, config: PoolConfig) -> Self {
        Self {
            manager,
            processor,
            config,
            state: Mutex::new(PoolState::Stopped),
        }
    }

    /// Spawns `max_concurrent` poll workers and one recovery sweeper.
    /// No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if matches!(&*state, PoolState::Running { .. }) {
            return;
        }
        let token = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.config.max_concurrent + 1);

        for worker_index in 0..self.config.max_concurrent {
            let pool = Arc::clone(self);
            let worker_token = token.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_index, worker_token).await;
            }));
        }

        let sweeper = RecoverySweeper::new(Arc::clone(&self.manager), self.config.recovery_interval);
        let recovery_token = token.clone();
        handles.push(tokio::spawn(async move {
            sweeper.run(recovery_token).await;
        }));

        tracing::info!(workers = self.config.max_concurrent, "queue_pool_started");
        *state = PoolState::Running { token, handles };
    }

    /// Signals every spawned loop to stop via the generation's
    /// `CancellationToken` and waits for them to exit. No-op if already
    /// stopped.
    pub async fn stop(&self) {
        let (token, handles) = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, PoolState::Stopped) {
                PoolState::Running { token, handles } => (token, handles),
                PoolState::Stopped => return,
            }
        };
        token.cancel();
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("queue_pool_stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.state.lock(), PoolState::Running { .. })
    }

    async fn worker_loop(&self, worker_index: usize, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(worker_index, "queue_worker_stopping");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            match self.manager.get_next_task().await {
                Ok(Some(task)) => {
                    let task_id = task.id.clone();
                    if let Err(err) = self.processor.process(task).await {
                        tracing::warn!(task_id = %task_id, worker_index, error = %err, "queue_worker_process_failed");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(worker_index, error = %err, "queue_worker_poll_failed");
                }
            }
        }
    }

}
