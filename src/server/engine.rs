//! Server engine interface
//!
//! The listener controller drives FTP serving through these two traits. The
//! bundled implementation lives in `crate::engine`; tests substitute their own.

use std::io;
use std::net::SocketAddr;

use crate::auth::AccountTable;
use crate::server::shutdown::ShutdownSignal;

/// Produces bound servers for a fixed account snapshot.
pub trait ServerEngine: Send + Sync {
    /// Binds `addr` synchronously so bind failures surface to the caller
    /// before any serving thread exists.
    fn bind(&self, addr: SocketAddr, accounts: AccountTable) -> io::Result<Box<dyn BoundServer>>;
}

/// A bound, not yet serving, FTP server.
pub trait BoundServer: Send {
    /// Address actually bound, with the real port when 0 was requested.
    fn local_addr(&self) -> SocketAddr;

    /// Serves until `shutdown` fires, then closes every open connection
    /// before returning.
    fn serve_forever(self: Box<Self>, shutdown: ShutdownSignal) -> io::Result<()>;
}
