//! Module `state`
//!
//! Connection state of a client session.

use std::fmt;

/// Position of a session in its `Disconnected → Connecting → Connected`
/// lifecycle. `Connecting` lasts exactly as long as one connect task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    /// Returns whether the state is externally observable between tasks.
    pub fn is_stable(&self) -> bool {
        !matches!(self, SessionState::Connecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(name)
    }
}
