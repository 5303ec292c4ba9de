//! Bounded admission queue: the server's only backpressure point.
//!
//! A submission either lands in the buffer, possibly after waiting for a
//! slot up to the configured timeout, or is rejected so the caller can try
//! again later. It never waits longer than that.

use crate::config::ServerConfig;
use crate::task::Task;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Queue full for the whole wait, or no workers left to drain it.
    Rejected,
}

/// Producer side of the queue. Cheap to clone; one per request handler.
#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    tx: mpsc::Sender<Task>,
    submit_timeout: Duration,
}

/// Consumer side, shared by all workers of a pool.
#[derive(Debug, Clone)]
pub struct TaskReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl AdmissionQueue {
    /// A queue holding at most `capacity` tasks (minimum 1).
    pub fn new(capacity: usize, submit_timeout: Duration) -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self { tx, submit_timeout },
            TaskReceiver {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    pub fn from_config(config: &ServerConfig) -> (Self, TaskReceiver) {
        Self::new(config.queue_capacity, config.submit_timeout())
    }

    /// Enqueue `task`, waiting at most the submit timeout for a free slot.
    pub async fn submit(&self, task: Task) -> Admission {
        match self.tx.send_timeout(task, self.submit_timeout).await {
            Ok(()) => Admission::Accepted,
            Err(SendTimeoutError::Timeout(task)) => {
                warn!(task_id = task.id(), "Admission queue full, rejecting task");
                Admission::Rejected
            }
            Err(SendTimeoutError::Closed(task)) => {
                warn!(task_id = task.id(), "No workers left, rejecting task");
                Admission::Rejected
            }
        }
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl TaskReceiver {
    /// Wait for the next task. `None` once every producer is gone and the
    /// buffer is drained.
    pub async fn next(&self) -> Option<Task> {
        let mut rx = self.rx.lock().await;
        let task = rx.recv().await;
        if let Some(ref t) = task {
            debug!(task_id = t.id(), "Dequeued task");
        }
        task
    }
}
