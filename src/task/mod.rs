//! Background task execution
//!
//! Runs blocking operations off the control context and delivers one terminal
//! outcome per task.

pub mod results;
pub mod runner;

pub use results::{TaskEvent, TaskId, TaskStatus};
pub use runner::{Progress, TaskRunner};
