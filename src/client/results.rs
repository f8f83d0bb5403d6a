//! Session result types
//!
//! Defines what session tasks hand back to the control context and what the
//! session reports to the presentation layer after applying them.

use std::fmt;
use std::path::PathBuf;

use crate::client::transport::FtpConnection;
use crate::error::FtpError;

/// One row of a local or remote directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// `None` for directories and entries whose size could not be determined.
    pub size: Option<u64>,
}

/// Live connection produced by a successful connect task.
pub struct ConnectionHandle(pub(crate) Box<dyn FtpConnection>);

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionHandle(..)")
    }
}

/// Raw value produced by a session task, applied by `Session::handle_event`.
#[derive(Debug)]
pub enum SessionReply {
    Connected(ConnectionHandle),
    Listing(Vec<DirEntry>),
    Uploaded { remote_name: String, bytes: u64 },
    Downloaded { local_path: PathBuf, bytes: u64 },
    Closed,
}

/// Completed operation as seen by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Connected { host: String, port: u16 },
    Listing(Vec<DirEntry>),
    Uploaded { remote_name: String, bytes: u64 },
    Downloaded { local_path: PathBuf, bytes: u64 },
}

/// Notification returned by the session for a current (non-stale) task event.
#[derive(Debug)]
pub enum SessionEvent {
    Progress {
        operation: &'static str,
        transferred: u64,
        total: Option<u64>,
    },
    Completed {
        operation: &'static str,
        outcome: SessionOutcome,
    },
    Failed {
        operation: &'static str,
        error: FtpError,
    },
}
