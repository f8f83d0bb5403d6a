//! Client session management
//!
//! Owns the lifecycle of one remote connection. Every network operation runs
//! as a task on the session's runner; the control context feeds the runner's
//! events back through [`Session::handle_event`], which applies state
//! transitions and drops results that belong to an earlier generation.

use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::results::{
    ConnectionHandle, DirEntry, SessionEvent, SessionOutcome, SessionReply,
};
use crate::client::state::SessionState;
use crate::client::transport::{FtpConnection, FtpConnector};
use crate::error::{ClientError, FtpError};
use crate::task::{TaskEvent, TaskId, TaskRunner, TaskStatus};

type SharedConnection = Arc<Mutex<Box<dyn FtpConnection>>>;

/// The one task a session is waiting on.
struct PendingTask {
    id: TaskId,
    generation: u64,
    operation: &'static str,
}

/// Client-side view of one remote FTP connection.
pub struct Session {
    connector: Arc<dyn FtpConnector>,
    runner: TaskRunner<SessionReply>,
    state: SessionState,
    generation: u64,
    endpoint: Option<(String, u16)>,
    connection: Option<SharedConnection>,
    pending: Option<PendingTask>,
}

impl Session {
    pub fn new(connector: Arc<dyn FtpConnector>, runner: TaskRunner<SessionReply>) -> Self {
        Self {
            connector,
            runner,
            state: SessionState::Disconnected,
            generation: 0,
            endpoint: None,
            connection: None,
            pending: None,
        }
    }

    // --------------------
    // Synchronous queries
    // --------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Incremented on every state transition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn endpoint(&self) -> Option<(&str, u16)> {
        self.endpoint.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    /// Returns whether an operation is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    // --------------------
    // Operations
    // --------------------

    /// Opens a connection and logs in. Only legal while disconnected.
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<TaskId, FtpError> {
        if self.state != SessionState::Disconnected {
            return Err(FtpError::InvalidState(format!(
                "cannot connect while {}",
                self.state
            )));
        }

        self.transition(SessionState::Connecting);
        self.endpoint = Some((host.to_string(), port));
        info!("Connecting to {}:{} as {}", host, port, username);

        let connector = Arc::clone(&self.connector);
        let host = host.to_string();
        let username = username.to_string();
        let password = password.to_string();
        let id = self.runner.dispatch("connect", move |_| {
            let mut connection = connector.connect(&host, port)?;
            connection.login(&username, &password)?;
            Ok(SessionReply::Connected(ConnectionHandle(connection)))
        });
        self.track(id, "connect");
        Ok(id)
    }

    /// Returns to `Disconnected` immediately. The connection, if any, is
    /// closed on a worker; errors while closing are only logged. Results of
    /// an abandoned task are discarded when they arrive.
    pub fn disconnect(&mut self) -> Result<(), FtpError> {
        if self.state == SessionState::Disconnected {
            return Err(FtpError::InvalidState("not connected".into()));
        }

        if let Some(pending) = self.pending.take() {
            info!("Abandoning task {} ({})", pending.id, pending.operation);
        }
        self.transition(SessionState::Disconnected);
        self.endpoint = None;

        if let Some(connection) = self.connection.take() {
            self.runner.dispatch("disconnect", move |_| {
                if let Ok(mut conn) = connection.lock() {
                    if let Err(e) = conn.quit() {
                        warn!("Error while closing connection: {}", e);
                    }
                } else {
                    warn!("Connection lock poisoned; dropping it without QUIT");
                }
                Ok(SessionReply::Closed)
            });
        }
        Ok(())
    }

    /// Lists the remote working directory. Entries whose size lookup fails
    /// are reported with an unknown size.
    pub fn list_remote(&mut self) -> Result<TaskId, FtpError> {
        let connection = self.ready("list")?;
        let id = self.runner.dispatch("list", move |_| {
            let mut conn = lock(&connection)?;
            let names = conn.list()?;

            let mut entries = Vec::with_capacity(names.len());
            for name in names {
                let size = match conn.size(&name) {
                    Ok(size) => size,
                    Err(e) => {
                        debug!("Size of {} unavailable: {}", name, e);
                        None
                    }
                };
                entries.push(DirEntry { name, size });
            }
            Ok(SessionReply::Listing(entries))
        });
        self.track(id, "list");
        Ok(id)
    }

    /// Uploads a local file. An existing remote file is overwritten.
    pub fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<TaskId, FtpError> {
        let connection = self.ready("upload")?;
        let local_path = local_path.to_path_buf();
        let remote_name = remote_name.to_string();

        let id = self.runner.dispatch("upload", move |progress| {
            let file = File::open(&local_path)
                .map_err(|e| FtpError::local_io(local_path.display().to_string(), e))?;
            let total = file.metadata().ok().map(|meta| meta.len());
            let mut source = LocalFile::new(file);

            let mut conn = lock(&connection)?;
            let bytes = conn
                .store(&remote_name, &mut source, &mut |sent| {
                    progress.report(sent, total)
                })
                .map_err(|e| source.classify(&local_path, e))?;
            info!("Uploaded {} as {} ({} bytes)", local_path.display(), remote_name, bytes);
            Ok(SessionReply::Uploaded { remote_name, bytes })
        });
        self.track(id, "upload");
        Ok(id)
    }

    /// Downloads a remote file. An existing local file is overwritten; a
    /// failed transfer removes the partial file.
    pub fn download(&mut self, remote_name: &str, local_path: &Path) -> Result<TaskId, FtpError> {
        let connection = self.ready("download")?;
        let remote_name = remote_name.to_string();
        let local_path = local_path.to_path_buf();

        let id = self.runner.dispatch("download", move |progress| {
            let mut conn = lock(&connection)?;
            let total = conn.size(&remote_name).ok().flatten();

            let file = File::create(&local_path)
                .map_err(|e| FtpError::local_io(local_path.display().to_string(), e))?;
            let mut sink = LocalFile::new(file);
            let result = conn.retrieve(&remote_name, &mut sink, &mut |received| {
                progress.report(received, total)
            });

            match result {
                Ok(bytes) => {
                    drop(sink);
                    info!("Downloaded {} to {} ({} bytes)", remote_name, local_path.display(), bytes);
                    Ok(SessionReply::Downloaded { local_path, bytes })
                }
                Err(e) => {
                    let error = sink.classify(&local_path, e);
                    drop(sink);
                    let _ = fs::remove_file(&local_path);
                    Err(error)
                }
            }
        });
        self.track(id, "download");
        Ok(id)
    }

    // --------------------
    // Outcome delivery
    // --------------------

    /// Applies one runner event. Returns `None` for progress or outcomes of
    /// tasks the session no longer waits on.
    pub fn handle_event(&mut self, event: TaskEvent<SessionReply>) -> Option<SessionEvent> {
        let operation = match &self.pending {
            Some(pending) if pending.id == event.id && pending.generation == self.generation => {
                pending.operation
            }
            _ => {
                debug!(
                    "Discarding stale event from task {} ({})",
                    event.id, event.operation
                );
                return None;
            }
        };

        match event.status {
            TaskStatus::Progress { transferred, total } => Some(SessionEvent::Progress {
                operation,
                transferred,
                total,
            }),
            TaskStatus::Completed(reply) => {
                self.pending = None;
                self.apply(operation, reply)
                    .map(|outcome| SessionEvent::Completed { operation, outcome })
            }
            TaskStatus::Failed(error) => {
                self.pending = None;
                if self.state == SessionState::Connecting {
                    self.transition(SessionState::Disconnected);
                    self.endpoint = None;
                }
                warn!("Session {} failed: {}", operation, error);
                Some(SessionEvent::Failed { operation, error })
            }
        }
    }

    fn apply(&mut self, operation: &'static str, reply: SessionReply) -> Option<SessionOutcome> {
        let outcome = match reply {
            SessionReply::Connected(handle) => {
                self.connection = Some(Arc::new(Mutex::new(handle.0)));
                self.transition(SessionState::Connected);
                let (host, port) = self.endpoint.clone().unwrap_or_default();
                SessionOutcome::Connected { host, port }
            }
            SessionReply::Listing(entries) => SessionOutcome::Listing(entries),
            SessionReply::Uploaded { remote_name, bytes } => {
                SessionOutcome::Uploaded { remote_name, bytes }
            }
            SessionReply::Downloaded { local_path, bytes } => {
                SessionOutcome::Downloaded { local_path, bytes }
            }
            SessionReply::Closed => {
                debug!("Ignoring close acknowledgement for {}", operation);
                return None;
            }
        };
        Some(outcome)
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session {} -> {}", self.state, next);
        self.state = next;
        self.generation += 1;
    }

    fn track(&mut self, id: TaskId, operation: &'static str) {
        self.pending = Some(PendingTask {
            id,
            generation: self.generation,
            operation,
        });
    }

    /// Gate for connected-only operations: state first, then single-flight.
    fn ready(&self, operation: &str) -> Result<SharedConnection, FtpError> {
        if self.state != SessionState::Connected {
            return Err(FtpError::InvalidState(format!(
                "{} requires a connected session (currently {})",
                operation, self.state
            )));
        }
        if let Some(pending) = &self.pending {
            return Err(FtpError::Busy(format!(
                "{} still in progress",
                pending.operation
            )));
        }
        self.connection
            .clone()
            .ok_or_else(|| FtpError::InvalidState("connected session has no connection".into()))
    }
}

/// Local end of a transfer. Remembers its own I/O failure so the transfer
/// error can be reported against the local file instead of the network.
struct LocalFile {
    file: File,
    failure: Option<io::Error>,
}

impl LocalFile {
    fn new(file: File) -> Self {
        Self {
            file,
            failure: None,
        }
    }

    fn record(&mut self, error: io::Error) -> io::Error {
        if error.kind() == io::ErrorKind::Interrupted {
            return error;
        }
        let forwarded = io::Error::new(error.kind(), error.to_string());
        self.failure.get_or_insert(error);
        forwarded
    }

    fn classify(&mut self, path: &Path, error: ClientError) -> FtpError {
        match self.failure.take() {
            Some(local) => FtpError::local_io(path.display().to_string(), local),
            None => error.into(),
        }
    }
}

impl Read for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf).map_err(|e| self.record(e))
    }
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf).map_err(|e| self.record(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush().map_err(|e| self.record(e))
    }
}

fn lock(connection: &SharedConnection) -> Result<MutexGuard<'_, Box<dyn FtpConnection>>, FtpError> {
    connection
        .lock()
        .map_err(|_| FtpError::Worker("connection poisoned by an earlier panic".into()))
}

/// Default local destination for a download: `dir/<remote name>`.
pub fn local_target(dir: &Path, remote_name: &str) -> PathBuf {
    let name = Path::new(remote_name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| remote_name.into());
    dir.join(name)
}
