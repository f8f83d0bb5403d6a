//! Engine core
//!
//! Binds the control socket and runs the accept loop. Each control
//! connection is served by its own task; all of them live in one `JoinSet`
//! so shutdown can abort every open connection at once.

use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::auth::AccountTable;
use crate::engine::commands::{Command, CommandStatus, parse_command};
use crate::engine::connection::ConnectionState;
use crate::engine::handlers::{HandlerContext, handle_command};
use crate::engine::responses::{READY, SYNTAX_ERROR, format_response};
use crate::server::{BoundServer, ServerEngine, ShutdownSignal};

const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Tunables of the built-in engine.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// How long a transfer waits for the client to open its passive connection.
    pub data_timeout: Duration,
    pub max_command_length: usize,
    pub greeting: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_timeout: Duration::from_secs(30),
            max_command_length: 512,
            greeting: "Welcome to RAX FTP Server".to_string(),
        }
    }
}

/// The bundled FTP server engine.
#[derive(Clone, Debug, Default)]
pub struct RaxEngine {
    settings: Arc<EngineSettings>,
}

impl RaxEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl ServerEngine for RaxEngine {
    fn bind(&self, addr: SocketAddr, accounts: AccountTable) -> io::Result<Box<dyn BoundServer>> {
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        debug!("Engine bound to {}", local_addr);
        Ok(Box::new(RaxServer {
            listener,
            local_addr,
            accounts: Arc::new(accounts),
            settings: Arc::clone(&self.settings),
        }))
    }
}

/// A bound control socket with its account snapshot.
struct RaxServer {
    listener: std::net::TcpListener,
    local_addr: SocketAddr,
    accounts: Arc<AccountTable>,
    settings: Arc<EngineSettings>,
}

impl BoundServer for RaxServer {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn serve_forever(self: Box<Self>, shutdown: ShutdownSignal) -> io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.accept_loop(shutdown))
    }
}

impl RaxServer {
    async fn accept_loop(self: Box<Self>, mut shutdown: ShutdownSignal) -> io::Result<()> {
        let RaxServer {
            listener,
            local_addr,
            accounts,
            settings,
        } = *self;
        let listener = TcpListener::from_std(listener)?;
        let mut connections = JoinSet::new();
        let mut accept_failures = 0u32;
        info!("Accepting FTP connections on {}", local_addr);

        loop {
            tokio::select! {
                _ = shutdown.triggered() => {
                    info!("Shutdown requested for {}", local_addr);
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_failures = 0;
                        let accounts = Arc::clone(&accounts);
                        let settings = Arc::clone(&settings);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, accounts, settings).await {
                                warn!("Connection with {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let delay = accept_backoff(accept_failures);
                        error!("Error accepting connection: {} (retrying in {:?})", e, delay);
                        tokio::select! {
                            _ = shutdown.triggered() => {
                                info!("Shutdown requested for {}", local_addr);
                                break;
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        let open = connections.len();
        connections.shutdown().await;
        info!("Closed {} open connections on {}", open, local_addr);
        Ok(())
    }
}

/// Delay before the next accept after `failures` consecutive errors,
/// doubling from 100ms up to a 5s ceiling.
fn accept_backoff(failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_INITIAL
        .saturating_mul(1 << doublings)
        .min(ACCEPT_BACKOFF_MAX)
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    TooLong,
}

/// Reads one command line into `line`, buffering at most `limit + 1` bytes.
/// The remainder of an over-long line is skipped up to its newline.
async fn read_command_line<R>(reader: &mut R, line: &mut String, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let mut raw = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut raw)
        .await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if raw.len() <= limit {
        line.push_str(&String::from_utf8_lossy(&raw));
        return Ok(LineRead::Line);
    }
    if raw.last() == Some(&b'\n') {
        return Ok(LineRead::TooLong);
    }

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(LineRead::TooLong);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if done {
            return Ok(LineRead::TooLong);
        }
    }
}

/// Serves one control connection until QUIT, EOF or a read error.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    accounts: Arc<AccountTable>,
    settings: Arc<EngineSettings>,
) -> io::Result<()> {
    let local_ip = stream.local_addr()?.ip();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut conn = ConnectionState::new(peer, local_ip);
    let mut line = String::new();

    info!("Client {} connected", peer);
    write_half
        .write_all(format_response(READY, &settings.greeting).as_bytes())
        .await?;

    loop {
        match read_command_line(&mut reader, &mut line, settings.max_command_length).await? {
            LineRead::Eof => {
                info!("Connection closed by client {}", peer);
                break;
            }
            LineRead::TooLong => {
                write_half
                    .write_all(format_response(SYNTAX_ERROR, "Command too long.").as_bytes())
                    .await?;
                continue;
            }
            LineRead::Line => {}
        }

        let command = parse_command(&line);
        // Arguments are never logged; PASS carries a secret.
        debug!("Received {} from {}", command.name(), peer);

        let mut ctx = HandlerContext {
            accounts: &accounts,
            settings: &settings,
            control: &mut write_half,
        };
        let result = handle_command(&mut conn, &command, &mut ctx).await;

        if let Some(message) = &result.message {
            write_half.write_all(message.as_bytes()).await?;
        }
        match result.status {
            CommandStatus::CloseConnection => {
                if !matches!(command, Command::QUIT) {
                    warn!("Closing connection with {}: {:?}", peer, result.message);
                }
                break;
            }
            CommandStatus::Failure(reason) => {
                debug!("{} failed for {}: {}", command.name(), peer, reason);
            }
            CommandStatus::Success => {}
        }
    }

    let _ = write_half.shutdown().await;
    info!("Client {} disconnected", peer);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn over_long_lines_are_skipped_whole() {
        let input = format!("NOOP\r\n{}\r\nUSER alice\r\n", "X".repeat(100));
        let mut reader = input.as_bytes();
        let mut line = String::new();

        assert_eq!(read_command_line(&mut reader, &mut line, 20).await.unwrap(), LineRead::Line);
        assert_eq!(line, "NOOP\r\n");
        assert_eq!(read_command_line(&mut reader, &mut line, 20).await.unwrap(), LineRead::TooLong);
        assert!(line.is_empty());
        assert_eq!(read_command_line(&mut reader, &mut line, 20).await.unwrap(), LineRead::Line);
        assert_eq!(line, "USER alice\r\n");
        assert_eq!(read_command_line(&mut reader, &mut line, 20).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn unterminated_flood_is_not_buffered() {
        let flood = vec![b'A'; 1 << 20];
        let mut reader = BufReader::with_capacity(64, flood.as_slice());
        let mut line = String::new();

        assert_eq!(read_command_line(&mut reader, &mut line, 512).await.unwrap(), LineRead::TooLong);
        assert!(line.is_empty());
        assert_eq!(read_command_line(&mut reader, &mut line, 512).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let mut reader: &[u8] = b"NOOP\r\n";
        let mut line = String::new();
        assert_eq!(read_command_line(&mut reader, &mut line, 6).await.unwrap(), LineRead::Line);
        assert_eq!(line, "NOOP\r\n");
    }

    #[test]
    fn accept_backoff_doubles_up_to_a_ceiling() {
        assert_eq!(accept_backoff(1), Duration::from_millis(100));
        assert_eq!(accept_backoff(2), Duration::from_millis(200));
        assert_eq!(accept_backoff(4), Duration::from_millis(800));
        assert_eq!(accept_backoff(7), Duration::from_secs(5));
        assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(5));
    }
}
