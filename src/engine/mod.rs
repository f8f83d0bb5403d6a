//! Built-in FTP server engine
//!
//! A small passive-mode FTP server driven by the listener controller. Each
//! account is confined to its home directory and limited by its permission
//! flags.

pub mod commands;
pub mod connection;
pub mod core;
pub mod handlers;
pub mod paths;
pub mod responses;
pub mod storage;

pub use commands::{Command, CommandResult, CommandStatus, parse_command};
pub use self::core::{EngineSettings, RaxEngine};
