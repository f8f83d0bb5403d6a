//! RAX FTP suite
//!
//! A small FTP client and server sharing one process: a background task
//! runner, a client session state machine, an authorization store and a
//! controller for the bundled FTP server engine.

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod server;
pub mod task;
pub mod utils;

pub use auth::AuthorizationStore;
pub use client::Session;
pub use error::FtpError;
pub use server::ListenerController;
pub use task::TaskRunner;
