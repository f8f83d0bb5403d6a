//! Error handling
//!
//! Defines error types and diagnostic helpers shared by the client, server and
//! console layers.

pub mod handlers;
pub mod types;

pub use handlers::{describe, report};
pub use types::*;
