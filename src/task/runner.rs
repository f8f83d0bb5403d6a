//! Module `runner`
//!
//! Executes blocking operations on dedicated worker threads and posts their
//! outcomes to the control context through an unbounded tokio channel. The
//! sending side is usable from plain threads; the control context can drain
//! it with `recv().await`, `try_recv()` or `blocking_recv()`.

use log::{debug, error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::FtpError;
use crate::task::results::{TaskEvent, TaskId, TaskStatus};

/// Dispatches one-shot background operations.
///
/// Every dispatched operation yields exactly one terminal notification on the
/// runner's channel. The runner never bounds concurrency and never retries.
pub struct TaskRunner<T> {
    events: UnboundedSender<TaskEvent<T>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for TaskRunner<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

/// Handle passed to a running operation for incremental progress reports.
pub struct Progress<T> {
    id: TaskId,
    operation: &'static str,
    events: UnboundedSender<TaskEvent<T>>,
}

impl<T> Progress<T> {
    /// Posts a progress notification for the owning task.
    pub fn report(&self, transferred: u64, total: Option<u64>) {
        let _ = self.events.send(TaskEvent {
            id: self.id,
            operation: self.operation,
            status: TaskStatus::Progress { transferred, total },
        });
    }

    pub fn task_id(&self) -> TaskId {
        self.id
    }
}

impl<T: Send + 'static> TaskRunner<T> {
    /// Creates a runner together with the receiving end of its delivery channel.
    pub fn new() -> (Self, UnboundedReceiver<TaskEvent<T>>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let runner = Self {
            events,
            next_id: Arc::new(AtomicU64::new(0)),
        };
        (runner, receiver)
    }

    /// Runs `work` on its own worker thread and returns immediately.
    ///
    /// The returned id tags every notification the task posts. A panic inside
    /// `work` is caught on the worker and delivered as `FtpError::Worker`.
    pub fn dispatch<F>(&self, operation: &'static str, work: F) -> TaskId
    where
        F: FnOnce(&Progress<T>) -> Result<T, FtpError> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let progress = Progress {
            id,
            operation,
            events: self.events.clone(),
        };
        let events = self.events.clone();

        let spawned = thread::Builder::new()
            .name(format!("task-{}-{}", operation, id))
            .spawn(move || {
                debug!("Task {} ({}) started", id, operation);
                let status = match panic::catch_unwind(AssertUnwindSafe(|| work(&progress))) {
                    Ok(Ok(value)) => TaskStatus::Completed(value),
                    Ok(Err(err)) => TaskStatus::Failed(err),
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        error!("Task {} ({}) panicked: {}", id, operation, msg);
                        TaskStatus::Failed(FtpError::Worker(msg))
                    }
                };
                debug!("Task {} ({}) finished", id, operation);
                deliver(&events, TaskEvent { id, operation, status });
            });

        if let Err(e) = spawned {
            error!("Failed to spawn worker for task {} ({}): {}", id, operation, e);
            deliver(
                &self.events,
                TaskEvent {
                    id,
                    operation,
                    status: TaskStatus::Failed(FtpError::Worker(format!(
                        "could not spawn worker thread: {}",
                        e
                    ))),
                },
            );
        }

        id
    }
}

fn deliver<T>(events: &UnboundedSender<TaskEvent<T>>, event: TaskEvent<T>) {
    let id = event.id;
    if events.send(event).is_err() {
        debug!("Control context gone; dropping outcome of task {}", id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
