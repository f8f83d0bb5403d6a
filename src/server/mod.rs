//! Server side
//!
//! Listener lifecycle and the engine interface it drives.

pub mod engine;
pub mod listener;
pub mod shutdown;

pub use engine::{BoundServer, ServerEngine};
pub use listener::{ListenerController, ListenerState};
pub use shutdown::{Closer, ShutdownSignal, shutdown_channel};
