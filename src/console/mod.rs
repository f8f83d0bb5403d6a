//! Operator console
//!
//! Line-oriented control surface over one client session, the authorization
//! store and the listener controller. Input lines and session task events
//! are handled on the same task, so the core is only ever driven from one
//! control context.

pub mod commands;

use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use crate::auth::{Account, AuthorizationStore};
use crate::client::{
    DirEntry, Session, SessionEvent, SessionOutcome, SessionReply, SessionState, TcpConnector,
    list_local, local_target,
};
use crate::config::AppConfig;
use crate::engine::RaxEngine;
use crate::error::{FtpError, describe};
use crate::server::ListenerController;
use crate::task::{TaskEvent, TaskRunner};

pub use commands::{ConsoleCommand, HELP, ParseError, parse_command};

/// How long exit waits for an open connection to say goodbye.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Whether the console keeps reading input.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything the console drives.
pub struct Console {
    config: AppConfig,
    session: Session,
    store: AuthorizationStore,
    listener: ListenerController,
    local_dir: PathBuf,
}

impl Console {
    pub fn new(config: AppConfig, runner: TaskRunner<SessionReply>) -> Self {
        let connector = TcpConnector::new(config.client_timeout());
        let engine = RaxEngine::new(config.engine_settings());
        let local_dir = PathBuf::from(&config.client.local_root);
        Self {
            session: Session::new(Arc::new(connector), runner),
            store: AuthorizationStore::new(),
            listener: ListenerController::new(Arc::new(engine)),
            local_dir,
            config,
        }
    }

    /// Loads the configured account file if it exists.
    pub fn load_default_accounts(&self) {
        let path = self.config.accounts_path();
        if !path.exists() {
            info!("No account file at {}; starting with no accounts", path.display());
            return;
        }
        match self.store.load_from(&path) {
            Ok(count) => println!("Loaded {} accounts from {}", count, path.display()),
            Err(e) => println!("{}", describe("load", &e)),
        }
    }

    /// Runs one operator command. Failures are printed, never returned.
    pub fn execute(&mut self, command: ConsoleCommand) -> Flow {
        let outcome = match command {
            ConsoleCommand::Empty => Ok(()),
            ConsoleCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            ConsoleCommand::Quit => return Flow::Quit,
            ConsoleCommand::Status => {
                self.print_status();
                Ok(())
            }
            ConsoleCommand::Open {
                host,
                port,
                username,
                password,
            } => {
                let port = port.unwrap_or(self.config.client.default_port);
                self.session
                    .connect(&host, port, &username, &password)
                    .map(|_| println!("Connecting to {}:{}...", host, port))
                    .map_err(|e| ("open", e))
            }
            ConsoleCommand::Close => self
                .session
                .disconnect()
                .map(|_| println!("Disconnected."))
                .map_err(|e| ("close", e)),
            ConsoleCommand::Ls => self.session.list_remote().map(|_| ()).map_err(|e| ("ls", e)),
            ConsoleCommand::Lls => {
                self.print_local();
                Ok(())
            }
            ConsoleCommand::Lcd(path) => self.change_local_dir(&path).map_err(|e| ("lcd", e)),
            ConsoleCommand::Put { local, remote } => {
                let local_path = self.local_dir.join(&local);
                let remote = remote.unwrap_or_else(|| file_name(&local));
                self.session
                    .upload(&local_path, &remote)
                    .map(|_| ())
                    .map_err(|e| ("put", e))
            }
            ConsoleCommand::Get { remote, local } => {
                let local_path = match local {
                    Some(local) => self.local_dir.join(local),
                    None => local_target(&self.local_dir, &remote),
                };
                self.session
                    .download(&remote, &local_path)
                    .map(|_| ())
                    .map_err(|e| ("get", e))
            }
            ConsoleCommand::UserAdd {
                username,
                password,
                homedir,
                perm,
            } => self
                .store
                .add(Account::new(username.clone(), password, homedir, perm))
                .map(|_| println!("Added account {}", username))
                .map_err(|e| ("useradd", e)),
            ConsoleCommand::UserDel(username) => {
                if self.store.remove(&username) {
                    println!("Removed account {}", username);
                } else {
                    println!("No account named {}", username);
                }
                Ok(())
            }
            ConsoleCommand::Users => {
                self.print_users();
                Ok(())
            }
            ConsoleCommand::Save(path) => {
                let path = path.map(PathBuf::from).unwrap_or_else(|| self.config.accounts_path());
                self.store
                    .save_to(&path)
                    .map(|count| println!("Saved {} accounts to {}", count, path.display()))
                    .map_err(|e| ("save", e))
            }
            ConsoleCommand::Load(path) => {
                let path = path.map(PathBuf::from).unwrap_or_else(|| self.config.accounts_path());
                self.store
                    .load_from(&path)
                    .map(|count| println!("Loaded {} accounts from {}", count, path.display()))
                    .map_err(|e| ("load", e))
            }
            ConsoleCommand::Start { address, port } => {
                let address = address.unwrap_or_else(|| self.config.server.bind_address.clone());
                let port = port.unwrap_or(self.config.server.port);
                self.listener
                    .start(&address, port, &self.store)
                    .map(|addr| println!("FTP server listening on {}", addr))
                    .map_err(|e| ("start", e))
            }
            ConsoleCommand::Stop => self
                .listener
                .stop()
                .map(|_| println!("FTP server stopped."))
                .map_err(|e| ("stop", e)),
        };

        if let Err((operation, error)) = outcome {
            println!("{}", describe(operation, &error));
        }
        Flow::Continue
    }

    /// Applies one task event and renders what the session reports.
    pub fn on_task_event(&mut self, event: TaskEvent<SessionReply>) {
        let event = match self.session.handle_event(event) {
            Some(event) => event,
            None => return,
        };

        match event {
            SessionEvent::Progress {
                operation,
                transferred,
                total,
            } => {
                match total {
                    Some(total) if total > 0 => print!(
                        "\r{}: {}/{} bytes ({}%)",
                        operation,
                        transferred,
                        total,
                        transferred * 100 / total
                    ),
                    _ => print!("\r{}: {} bytes", operation, transferred),
                }
                let _ = std::io::stdout().flush();
            }
            SessionEvent::Completed { outcome, .. } => self.on_completed(outcome),
            SessionEvent::Failed { operation, error } => {
                println!();
                println!("{}", describe(operation, &error));
            }
        }
    }

    fn on_completed(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Connected { host, port } => {
                println!("Connected to {}:{}", host, port);
                self.refresh_remote();
            }
            SessionOutcome::Listing(entries) => {
                println!("Remote directory:");
                print_entries(&entries);
            }
            SessionOutcome::Uploaded { remote_name, bytes } => {
                println!();
                println!("Uploaded {} ({} bytes)", remote_name, bytes);
                self.refresh_remote();
            }
            SessionOutcome::Downloaded { local_path, bytes } => {
                println!();
                println!("Downloaded {} ({} bytes)", local_path.display(), bytes);
                self.print_local();
            }
        }
    }

    fn refresh_remote(&mut self) {
        if let Err(e) = self.session.list_remote() {
            warn!("Could not refresh remote listing: {}", e);
        }
    }

    fn change_local_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let target = self.local_dir.join(path);
        let canonical = target
            .canonicalize()
            .map_err(|e| FtpError::local_io(target.display().to_string(), e))?;
        if !canonical.is_dir() {
            return Err(FtpError::local_io(
                canonical.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        println!("Local directory is now {}", canonical.display());
        self.local_dir = canonical;
        Ok(())
    }

    fn print_local(&self) {
        match list_local(&self.local_dir) {
            Ok(entries) => {
                println!("Local directory {}:", self.local_dir.display());
                print_entries(&entries);
            }
            Err(e) => println!("{}", describe("lls", &e)),
        }
    }

    fn print_users(&self) {
        let accounts = self.store.list();
        if accounts.is_empty() {
            println!("No accounts.");
            return;
        }
        for account in accounts {
            println!(
                "{:<16} {:<10} {}",
                account.username,
                account.perm,
                account.homedir.display()
            );
        }
    }

    fn print_status(&self) {
        match self.session.endpoint() {
            Some((host, port)) => println!("Session: {} ({}:{})", self.session.state(), host, port),
            None => println!("Session: {}", self.session.state()),
        }
        if self.session.is_busy() {
            println!("  an operation is in progress");
        }
        match self.listener.local_addr() {
            Some(addr) => println!("Listener: {} on {}", self.listener.state(), addr),
            None => println!("Listener: {}", self.listener.state()),
        }
        println!("Accounts: {}", self.store.len());
        println!("Local directory: {}", self.local_dir.display());
    }
}

fn print_entries(entries: &[DirEntry]) {
    if entries.is_empty() {
        println!("  (empty)");
    }
    for entry in entries {
        match entry.size {
            Some(size) => println!("  {:>12}  {}", size, entry.name),
            None => println!("  {:>12}  {}", "-", entry.name),
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Runs the console until `quit` or end of input.
pub async fn run(config: AppConfig) -> Result<(), FtpError> {
    let (runner, events) = TaskRunner::new();
    let mut console = Console::new(config, runner);
    console.load_default_accounts();
    println!("Type `help` for a list of commands.");

    drive(&mut console, events).await
}

async fn drive(
    console: &mut Console,
    mut events: UnboundedReceiver<TaskEvent<SessionReply>>,
) -> Result<(), FtpError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| FtpError::local_io("<stdin>", e))?;
                let line = match line {
                    Some(line) => line,
                    None => break,
                };
                let flow = match parse_command(&line) {
                    Ok(command) => console.execute(command),
                    Err(e) => {
                        println!("{}", e);
                        Flow::Continue
                    }
                };
                if flow == Flow::Quit {
                    break;
                }
            }
            Some(event) = events.recv() => console.on_task_event(event),
        }
    }

    close_session(console, &mut events).await;
    info!("Console closed");
    Ok(())
}

/// Disconnects the session and waits for the close task, so QUIT reaches
/// the server before the process exits.
async fn close_session(
    console: &mut Console,
    events: &mut UnboundedReceiver<TaskEvent<SessionReply>>,
) {
    if console.session.state() == SessionState::Disconnected {
        return;
    }
    let had_connection = console.session.has_connection();
    if let Err(e) = console.session.disconnect() {
        warn!("Disconnect on exit failed: {}", e);
        return;
    }
    if !had_connection {
        return;
    }

    let closed = async {
        while let Some(event) = events.recv().await {
            if event.operation == "disconnect" && event.is_terminal() {
                break;
            }
        }
    };
    if timeout(CLOSE_GRACE, closed).await.is_err() {
        warn!("Connection did not close within {:?}", CLOSE_GRACE);
    }
}
