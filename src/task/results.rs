//! Task result types
//!
//! Defines the notifications a dispatched task posts back to the control
//! context.

use crate::error::FtpError;

/// Identifier assigned to each dispatched task, unique per runner.
pub type TaskId = u64;

/// One notification posted by a task.
#[derive(Debug)]
pub struct TaskEvent<T> {
    pub id: TaskId,
    pub operation: &'static str,
    pub status: TaskStatus<T>,
}

/// Payload of a task notification.
///
/// `Progress` may be posted any number of times before the single terminal
/// `Completed` or `Failed` notification.
#[derive(Debug)]
pub enum TaskStatus<T> {
    Progress { transferred: u64, total: Option<u64> },
    Completed(T),
    Failed(FtpError),
}

impl<T> TaskEvent<T> {
    /// Returns whether this is the task's final notification.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, TaskStatus::Progress { .. })
    }
}
