//! Error types
//!
//! Defines the error kinds surfaced by the client session, the authorization
//! store and the listener controller, plus the narrower error raised by the
//! FTP client collaborator.

use std::fmt;
use std::io;

/// Errors raised by an FTP client connection (transport or server reply).
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Reply { code: u16, text: String },
    Malformed(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {}", e),
            ClientError::Reply { code, text } => write!(f, "server replied {} {}", code, text),
            ClientError::Malformed(s) => write!(f, "malformed server response: {}", s),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        ClientError::Io(error)
    }
}

/// Core error covering every failure reported to the control surface.
#[derive(Debug)]
pub enum FtpError {
    /// Unreachable host, reset or closed connection.
    Network(String),
    /// Credentials rejected by the remote server.
    Auth(String),
    /// Unexpected or malformed server response.
    Protocol(String),
    /// Operation is illegal in the current state machine position.
    InvalidState(String),
    /// Another operation is still outstanding on the session.
    Busy(String),
    DuplicateAccount(String),
    InvalidAccount(String),
    /// The listener could not acquire the requested address.
    Bind { addr: String, source: io::Error },
    /// Malformed, unreadable or unwritable account file.
    Persistence(String),
    /// Local file could not be opened, created or read.
    LocalIo { path: String, source: io::Error },
    Worker(String),
}

impl FtpError {
    /// Stable kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FtpError::Network(_) => "NetworkError",
            FtpError::Auth(_) => "AuthError",
            FtpError::Protocol(_) => "ProtocolError",
            FtpError::InvalidState(_) => "InvalidStateError",
            FtpError::Busy(_) => "BusyError",
            FtpError::DuplicateAccount(_) => "DuplicateAccountError",
            FtpError::InvalidAccount(_) => "InvalidAccountError",
            FtpError::Bind { .. } => "BindError",
            FtpError::Persistence(_) => "PersistenceError",
            FtpError::LocalIo { .. } => "LocalIoError",
            FtpError::Worker(_) => "WorkerError",
        }
    }

    pub fn local_io(path: impl Into<String>, source: io::Error) -> Self {
        FtpError::LocalIo {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpError::Network(msg) => write!(f, "Network error: {}", msg),
            FtpError::Auth(msg) => write!(f, "Authentication rejected: {}", msg),
            FtpError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            FtpError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            FtpError::Busy(msg) => write!(f, "Session busy: {}", msg),
            FtpError::DuplicateAccount(u) => write!(f, "Account already exists: {}", u),
            FtpError::InvalidAccount(msg) => write!(f, "Invalid account: {}", msg),
            FtpError::Bind { addr, source } => write!(f, "Failed to bind to {}: {}", addr, source),
            FtpError::Persistence(msg) => write!(f, "Account file error: {}", msg),
            FtpError::LocalIo { path, source } => write!(f, "Local file {}: {}", path, source),
            FtpError::Worker(msg) => write!(f, "Worker failure: {}", msg),
        }
    }
}

impl std::error::Error for FtpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FtpError::Bind { source, .. } => Some(source),
            FtpError::LocalIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ClientError> for FtpError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Io(e) => FtpError::Network(e.to_string()),
            ClientError::Reply { code, text } if code == 530 || code == 332 => {
                FtpError::Auth(format!("{} {}", code, text))
            }
            ClientError::Reply { code, text } => FtpError::Protocol(format!("{} {}", code, text)),
            ClientError::Malformed(s) => FtpError::Protocol(s),
        }
    }
}
