//! Listener controller
//!
//! Start/stop lifecycle of the hosted FTP server. Binding happens on the
//! caller's thread; serving happens on a dedicated `ftp-listener` thread that
//! outlives the `start` call and is joined by `stop`.

use log::{error, info, warn};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::auth::AuthorizationStore;
use crate::error::FtpError;
use crate::server::engine::ServerEngine;
use crate::server::shutdown::{Closer, shutdown_channel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Running,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Stopped => f.write_str("stopped"),
            ListenerState::Running => f.write_str("running"),
        }
    }
}

struct RunningListener {
    local_addr: SocketAddr,
    closer: Closer,
    worker: JoinHandle<()>,
}

/// Owns at most one running server.
pub struct ListenerController {
    engine: Arc<dyn ServerEngine>,
    running: Option<RunningListener>,
}

impl ListenerController {
    pub fn new(engine: Arc<dyn ServerEngine>) -> Self {
        Self {
            engine,
            running: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        if self.running.is_some() {
            ListenerState::Running
        } else {
            ListenerState::Stopped
        }
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Starts serving the store's current accounts on `bind_address:bind_port`.
    ///
    /// Accounts are snapshotted here; later store edits do not reach the
    /// running server. Bind failures leave the controller stopped.
    pub fn start(
        &mut self,
        bind_address: &str,
        bind_port: u16,
        store: &AuthorizationStore,
    ) -> Result<SocketAddr, FtpError> {
        if let Some(running) = &self.running {
            return Err(FtpError::InvalidState(format!(
                "listener already running on {}",
                running.local_addr
            )));
        }

        let requested = format!("{}:{}", bind_address, bind_port);
        let addr = resolve(&requested)?;
        let accounts = store.snapshot();
        info!("Starting listener on {} with {} accounts", addr, accounts.len());

        let server = self
            .engine
            .bind(addr, accounts)
            .map_err(|source| FtpError::Bind {
                addr: requested.clone(),
                source,
            })?;
        let local_addr = server.local_addr();

        let (closer, signal) = shutdown_channel();
        let worker = thread::Builder::new()
            .name("ftp-listener".into())
            .spawn(move || {
                if let Err(e) = server.serve_forever(signal) {
                    error!("Listener on {} stopped with error: {}", local_addr, e);
                }
            })
            .map_err(|e| FtpError::Worker(format!("cannot spawn listener thread: {}", e)))?;

        info!("Listener running on {}", local_addr);
        self.running = Some(RunningListener {
            local_addr,
            closer,
            worker,
        });
        Ok(local_addr)
    }

    /// Closes every connection, releases the socket and waits for the
    /// serving thread to exit.
    pub fn stop(&mut self) -> Result<(), FtpError> {
        let running = self
            .running
            .take()
            .ok_or_else(|| FtpError::InvalidState("listener not running".into()))?;
        shut_down(running);
        Ok(())
    }
}

impl Drop for ListenerController {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            shut_down(running);
        }
    }
}

fn shut_down(running: RunningListener) {
    info!("Stopping listener on {}", running.local_addr);
    running.closer.close_all();
    if running.worker.join().is_err() {
        warn!("Listener thread for {} panicked", running.local_addr);
    }
    info!("Listener on {} stopped", running.local_addr);
}

fn resolve(requested: &str) -> Result<SocketAddr, FtpError> {
    let bind_error = |source| FtpError::Bind {
        addr: requested.to_string(),
        source,
    };
    requested
        .to_socket_addrs()
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            ))
        })
}
