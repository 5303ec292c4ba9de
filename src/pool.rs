//! Fixed-size worker pool.
//!
//! `num_workers` long-lived tokio tasks pull from the shared
//! [`TaskReceiver`], one task at a time each, so at most `num_workers` tasks
//! are in flight. Each task runs inside its own spawned tokio task: a panic
//! is contained there, logged, and the worker moves on to the next task.

use crate::queue::TaskReceiver;
use crate::worker::{process_task, WorkerContext};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Handle to the running workers.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `ctx.config.num_workers` workers draining `receiver`.
    pub fn start(receiver: TaskReceiver, ctx: Arc<WorkerContext>) -> Self {
        let count = ctx.config.num_workers.max(1);
        info!(worker_count = count, "Spawning conversion workers");

        let handles = (0..count)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    run_worker(worker_id, receiver, ctx).await;
                })
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit (after all queue producers are dropped
    /// and the backlog is done).
    pub async fn join(self) {
        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker_id, "Worker terminated abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn run_worker(worker_id: usize, receiver: TaskReceiver, ctx: Arc<WorkerContext>) {
    debug!(worker_id, "Worker starting");

    while let Some(task) = receiver.next().await {
        let task_id = task.id().to_string();
        info!(worker_id, task_id = %task_id, "Processing task");

        let ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move { process_task(&task, &ctx).await });

        match handle.await {
            Ok(outcome) => debug!(worker_id, task_id = %task_id, ?outcome, "Task finished"),
            Err(e) => error!(worker_id, task_id = %task_id, "Task aborted: {}", e),
        }
    }

    debug!(worker_id, "Worker stopping: queue closed");
}
