//! FTP client collaborator interface
//!
//! The session drives remote servers only through these traits, so tests can
//! substitute recording mocks for the blocking TCP implementation.

use std::io::{Read, Write};

use crate::error::ClientError;

/// Opens control connections to remote FTP servers.
pub trait FtpConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn FtpConnection>, ClientError>;
}

/// One open control connection. Every call blocks until the server answers.
pub trait FtpConnection: Send {
    fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError>;

    /// Names in the remote working directory.
    fn list(&mut self) -> Result<Vec<String>, ClientError>;

    /// Size of a remote file, `None` if the server cannot tell (directories).
    fn size(&mut self, name: &str) -> Result<Option<u64>, ClientError>;

    /// Downloads `name` into `sink`, calling `progress` with the running byte
    /// count. Returns the total number of bytes received.
    fn retrieve(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ClientError>;

    /// Uploads `source` as `name`, calling `progress` with the running byte
    /// count. Returns the total number of bytes sent.
    fn store(
        &mut self,
        name: &str,
        source: &mut dyn Read,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ClientError>;

    fn quit(&mut self) -> Result<(), ClientError>;
}
