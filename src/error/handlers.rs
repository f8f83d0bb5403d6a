//! Error handlers
//!
//! Renders failures as single-line diagnostics for the control surface.

use crate::error::types::FtpError;
use log::error;

/// Builds the human-readable diagnostic for a failed operation.
pub fn describe(operation: &str, err: &FtpError) -> String {
    format!("{} failed [{}]: {}", operation, err.kind(), err)
}

/// Logs a failed operation and returns its diagnostic line.
pub fn report(operation: &str, err: &FtpError) -> String {
    let line = describe(operation, err);
    error!("{}", line);
    line
}
