//! Command handlers
//!
//! One handler per FTP command. Handlers that move data write the
//! preliminary `150` reply themselves and return the final reply as a
//! `CommandResult`; everything else only returns its reply.

use log::{debug, info, warn};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::auth::{AccountTable, LoginError, validate_password, validate_user};
use crate::engine::commands::{Command, CommandResult};
use crate::engine::connection::ConnectionState;
use crate::engine::core::EngineSettings;
use crate::engine::paths::{is_within, resolve_virtual, virtual_to_real};
use crate::engine::responses::*;
use crate::engine::storage::list_directory;

/// Everything a handler may touch besides the connection state.
pub struct HandlerContext<'a, W> {
    pub accounts: &'a AccountTable,
    pub settings: &'a EngineSettings,
    pub control: &'a mut W,
}

/// Dispatches a parsed command to its handler.
pub async fn handle_command<W>(
    conn: &mut ConnectionState,
    command: &Command,
    ctx: &mut HandlerContext<'_, W>,
) -> CommandResult
where
    W: AsyncWrite + Unpin,
{
    if !conn.is_logged_in() && !command.allowed_anonymously() {
        return CommandResult::failure(NOT_LOGGED_IN, "Log in with USER and PASS first.");
    }

    match command {
        Command::USER(username) => handle_cmd_user(conn, username),
        Command::PASS(password) => handle_cmd_pass(conn, password, ctx.accounts).await,
        Command::QUIT => handle_cmd_quit(conn),
        Command::SYST => CommandResult::success(SYSTEM_TYPE, "UNIX Type: L8"),
        Command::NOOP => CommandResult::success(OK, "NOOP ok."),
        Command::TYPE(kind) => handle_cmd_type(kind),
        Command::PWD => CommandResult::success(
            PATH_CREATED,
            &format!("\"{}\" is the current directory.", conn.cwd()),
        ),
        Command::CWD(path) => handle_cmd_cwd(conn, path).await,
        Command::CDUP => handle_cmd_cwd(conn, "..").await,
        Command::PASV => handle_cmd_pasv(conn).await,
        Command::PORT => {
            CommandResult::failure(NOT_IMPLEMENTED, "Active mode not supported; use PASV.")
        }
        Command::LIST(path) => handle_cmd_list(conn, path.as_deref(), false, ctx).await,
        Command::NLST(path) => handle_cmd_list(conn, path.as_deref(), true, ctx).await,
        Command::SIZE(name) => handle_cmd_size(conn, name).await,
        Command::RETR(name) => handle_cmd_retr(conn, name, ctx).await,
        Command::STOR(name) => handle_cmd_stor(conn, name, false, ctx).await,
        Command::APPE(name) => handle_cmd_stor(conn, name, true, ctx).await,
        Command::DELE(name) => handle_cmd_dele(conn, name).await,
        Command::MKD(name) => handle_cmd_mkd(conn, name).await,
        Command::RMD(name) => handle_cmd_rmd(conn, name).await,
        Command::RNFR(name) => handle_cmd_rnfr(conn, name).await,
        Command::RNTO(name) => handle_cmd_rnto(conn, name).await,
        Command::INVALID(verb) => CommandResult::failure(
            ARGUMENT_ERROR,
            &format!("{} requires an argument.", verb),
        ),
        Command::UNKNOWN(verb) => {
            CommandResult::failure(SYNTAX_ERROR, &format!("Command \"{}\" not understood.", verb))
        }
    }
}

// --------------------
// Authentication
// --------------------

fn handle_cmd_user(conn: &mut ConnectionState, username: &str) -> CommandResult {
    match validate_user(username) {
        Ok(()) => {
            conn.set_username(Some(username.to_string()));
            CommandResult::success(PASSWORD_REQUIRED, "Username ok, send password.")
        }
        Err(e) => {
            conn.set_username(None);
            debug!("Rejected USER from {}: {}", conn.peer(), e);
            CommandResult::failure(ARGUMENT_ERROR, "Invalid username.")
        }
    }
}

async fn handle_cmd_pass(
    conn: &mut ConnectionState,
    password: &str,
    accounts: &AccountTable,
) -> CommandResult {
    if conn.is_logged_in() {
        return CommandResult::failure(BAD_SEQUENCE, "Already logged in.");
    }
    let username = match conn.username() {
        Some(username) => username.to_string(),
        None => return CommandResult::failure(BAD_SEQUENCE, "Login with USER first."),
    };

    let account = match validate_password(accounts, &username, password) {
        Ok(account) => account.clone(),
        Err(e) => {
            match &e {
                LoginError::MalformedInput(_) => debug!("Malformed PASS from {}", conn.peer()),
                _ => warn!("Failed login from {}: {}", conn.peer(), e),
            }
            conn.set_username(None);
            return CommandResult::failure(NOT_LOGGED_IN, "Login incorrect.");
        }
    };

    match fs::metadata(account.homedir()).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            warn!(
                "Home directory {} of {} is not usable",
                account.homedir().display(),
                username
            );
            conn.set_username(None);
            return CommandResult::failure(NOT_LOGGED_IN, "Home directory unavailable.");
        }
    }

    info!("User {} logged in from {}", username, conn.peer());
    conn.login(account);
    CommandResult::success(LOGIN_SUCCESS, "Login successful.")
}

fn handle_cmd_quit(conn: &mut ConnectionState) -> CommandResult {
    conn.logout();
    CommandResult::close(CLOSING, "Goodbye.")
}

fn handle_cmd_type(kind: &str) -> CommandResult {
    match kind.to_ascii_uppercase().as_str() {
        "I" | "L 8" => CommandResult::success(OK, "Type set to I."),
        "A" | "A N" => CommandResult::success(OK, "Type set to A."),
        _ => CommandResult::failure(PARAMETER_NOT_IMPLEMENTED, "Unsupported type."),
    }
}

// --------------------
// Path helpers
// --------------------

/// Checks `flag` against the logged in account and returns its home.
fn authorize(conn: &ConnectionState, flag: char) -> Result<PathBuf, CommandResult> {
    match conn.account() {
        Some(account) if account.perm().allows(flag) => Ok(account.homedir().to_path_buf()),
        Some(_) => Err(CommandResult::failure(
            FILE_UNAVAILABLE,
            "Not enough privileges.",
        )),
        None => Err(CommandResult::failure(
            NOT_LOGGED_IN,
            "Log in with USER and PASS first.",
        )),
    }
}

/// Resolves a client path to `(virtual, real)`, refusing anything that
/// escapes the home directory through a symlink.
async fn resolve(
    conn: &ConnectionState,
    flag: char,
    target: &str,
) -> Result<(String, PathBuf), CommandResult> {
    let home = authorize(conn, flag)?;
    let virtual_path = resolve_virtual(conn.cwd(), target);
    let real = virtual_to_real(&home, &virtual_path);
    if !is_within(&home, &real).await {
        return Err(CommandResult::failure(
            FILE_UNAVAILABLE,
            &format!("{}: No such file or directory.", virtual_path),
        ));
    }
    Ok((virtual_path, real))
}

fn io_failure(virtual_path: &str, error: &io::Error) -> CommandResult {
    let reason = match error.kind() {
        io::ErrorKind::NotFound => "No such file or directory",
        io::ErrorKind::PermissionDenied => "Permission denied",
        io::ErrorKind::AlreadyExists => "File exists",
        _ => "Requested action not taken",
    };
    CommandResult::failure(FILE_UNAVAILABLE, &format!("{}: {}.", virtual_path, reason))
}

// --------------------
// Navigation
// --------------------

async fn handle_cmd_cwd(conn: &mut ConnectionState, target: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'e', target).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    match fs::metadata(&real).await {
        Ok(meta) if meta.is_dir() => {
            conn.set_cwd(virtual_path.clone());
            CommandResult::success(
                FILE_ACTION_OK,
                &format!("\"{}\" is the current directory.", virtual_path),
            )
        }
        Ok(_) => CommandResult::failure(
            FILE_UNAVAILABLE,
            &format!("{}: Not a directory.", virtual_path),
        ),
        Err(e) => io_failure(&virtual_path, &e),
    }
}

// --------------------
// Data connections
// --------------------

async fn handle_cmd_pasv(conn: &mut ConnectionState) -> CommandResult {
    let ip = match conn.local_ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => {
            return CommandResult::failure(CANT_OPEN_DATA, "Passive mode requires IPv4.");
        }
    };

    let listener = match TcpListener::bind((ip, 0)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("Cannot open passive port for {}: {}", conn.peer(), e);
            return CommandResult::failure(CANT_OPEN_DATA, "Can't open passive connection.");
        }
    };
    let port = match listener.local_addr() {
        Ok(addr) => addr.port(),
        Err(_) => return CommandResult::failure(CANT_OPEN_DATA, "Can't open passive connection."),
    };
    conn.set_passive(listener);

    let [h1, h2, h3, h4] = ip.octets();
    debug!("Passive port {} opened for {}", port, conn.peer());
    CommandResult::success(
        PASSIVE_MODE,
        &format!(
            "Entering Passive Mode ({},{},{},{},{},{}).",
            h1,
            h2,
            h3,
            h4,
            port >> 8,
            port & 0xff
        ),
    )
}

/// Sends the preliminary reply and accepts the client's data connection.
async fn open_data<W>(
    conn: &mut ConnectionState,
    ctx: &mut HandlerContext<'_, W>,
    announce: &str,
) -> Result<TcpStream, CommandResult>
where
    W: AsyncWrite + Unpin,
{
    let listener = conn
        .take_passive()
        .ok_or_else(|| CommandResult::failure(CANT_OPEN_DATA, "Use PASV first."))?;

    ctx.control
        .write_all(format_response(FILE_STATUS_OK, announce).as_bytes())
        .await
        .map_err(|_| CommandResult::close(TRANSFER_ABORTED, "Control connection lost."))?;

    match timeout(ctx.settings.data_timeout, listener.accept()).await {
        Ok(Ok((stream, addr))) if addr.ip() == conn.peer().ip() => Ok(stream),
        Ok(Ok((_, addr))) => {
            warn!(
                "Refused data connection from {} for control peer {}",
                addr,
                conn.peer()
            );
            Err(CommandResult::failure(CANT_OPEN_DATA, "Data connection refused."))
        }
        Ok(Err(e)) => {
            warn!("Data connection for {} failed: {}", conn.peer(), e);
            Err(CommandResult::failure(CANT_OPEN_DATA, "Can't open data connection."))
        }
        Err(_) => Err(CommandResult::failure(
            CANT_OPEN_DATA,
            "Timed out waiting for data connection.",
        )),
    }
}

async fn handle_cmd_list<W>(
    conn: &mut ConnectionState,
    path: Option<&str>,
    names_only: bool,
    ctx: &mut HandlerContext<'_, W>,
) -> CommandResult
where
    W: AsyncWrite + Unpin,
{
    let (virtual_path, real) = match resolve(conn, 'l', path.unwrap_or(".")).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    let lines = match list_directory(&real, names_only).await {
        Ok(lines) => lines,
        Err(e) => return io_failure(&virtual_path, &e),
    };

    let mut data = match open_data(conn, ctx, "Opening data connection for directory listing.").await {
        Ok(stream) => stream,
        Err(result) => return result,
    };

    let mut payload = String::new();
    for line in &lines {
        payload.push_str(line);
        payload.push_str("\r\n");
    }
    let sent = async {
        data.write_all(payload.as_bytes()).await?;
        data.shutdown().await
    }
    .await;

    match sent {
        Ok(()) => {
            debug!("Listed {} ({} entries) for {}", virtual_path, lines.len(), conn.peer());
            CommandResult::success(TRANSFER_COMPLETE, "Transfer complete.")
        }
        Err(e) => {
            warn!("Listing transfer to {} aborted: {}", conn.peer(), e);
            CommandResult::failure(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
        }
    }
}

// --------------------
// Files
// --------------------

async fn handle_cmd_size(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'l', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    match fs::metadata(&real).await {
        Ok(meta) if meta.is_file() => CommandResult::success(SIZE, &meta.len().to_string()),
        Ok(_) => CommandResult::failure(
            FILE_UNAVAILABLE,
            &format!("{} is not retrievable.", virtual_path),
        ),
        Err(e) => io_failure(&virtual_path, &e),
    }
}

async fn handle_cmd_retr<W>(
    conn: &mut ConnectionState,
    name: &str,
    ctx: &mut HandlerContext<'_, W>,
) -> CommandResult
where
    W: AsyncWrite + Unpin,
{
    let (virtual_path, real) = match resolve(conn, 'r', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    let mut file = match fs::metadata(&real).await {
        Ok(meta) if meta.is_file() => match File::open(&real).await {
            Ok(file) => file,
            Err(e) => return io_failure(&virtual_path, &e),
        },
        Ok(_) => {
            return CommandResult::failure(
                FILE_UNAVAILABLE,
                &format!("{} is not retrievable.", virtual_path),
            );
        }
        Err(e) => return io_failure(&virtual_path, &e),
    };

    let mut data = match open_data(conn, ctx, "Opening BINARY mode data connection.").await {
        Ok(stream) => stream,
        Err(result) => return result,
    };

    let sent = async {
        let bytes = tokio::io::copy(&mut file, &mut data).await?;
        data.shutdown().await?;
        Ok::<u64, io::Error>(bytes)
    }
    .await;

    match sent {
        Ok(bytes) => {
            info!("Sent {} ({} bytes) to {}", virtual_path, bytes, conn.peer());
            CommandResult::success(TRANSFER_COMPLETE, "Transfer complete.")
        }
        Err(e) => {
            warn!("Download of {} by {} aborted: {}", virtual_path, conn.peer(), e);
            CommandResult::failure(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
        }
    }
}

/// Handles `STOR` and `APPE`.
///
/// `STOR` receives into a hidden temporary file next to the target and
/// renames it into place once the client closes the data connection, so a
/// failed upload never clobbers an existing file. `APPE` writes in place.
async fn handle_cmd_stor<W>(
    conn: &mut ConnectionState,
    name: &str,
    append: bool,
    ctx: &mut HandlerContext<'_, W>,
) -> CommandResult
where
    W: AsyncWrite + Unpin,
{
    let flag = if append { 'a' } else { 'w' };
    let (virtual_path, real) = match resolve(conn, flag, name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    if let Ok(meta) = fs::metadata(&real).await {
        if meta.is_dir() {
            return CommandResult::failure(
                FILE_UNAVAILABLE,
                &format!("{}: Is a directory.", virtual_path),
            );
        }
    }

    let (target, temp) = if append {
        (real.clone(), None)
    } else {
        let file_name = real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (real.with_file_name(format!(".{}.part", file_name)), Some(real.clone()))
    };

    let mut file = match OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&target)
        .await
    {
        Ok(file) => file,
        Err(e) => return io_failure(&virtual_path, &e),
    };

    let mut data = match open_data(conn, ctx, "Ready to receive data.").await {
        Ok(stream) => stream,
        Err(result) => {
            if temp.is_some() {
                let _ = fs::remove_file(&target).await;
            }
            return result;
        }
    };

    let received = async {
        let bytes = tokio::io::copy(&mut data, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<u64, io::Error>(bytes)
    }
    .await;
    drop(file);

    let bytes = match received {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Upload of {} from {} aborted: {}", virtual_path, conn.peer(), e);
            if temp.is_some() {
                let _ = fs::remove_file(&target).await;
            }
            return CommandResult::failure(TRANSFER_ABORTED, "Connection closed; transfer aborted.");
        }
    };

    if let Some(final_path) = temp {
        if let Err(e) = fs::rename(&target, &final_path).await {
            warn!("Cannot move upload into {}: {}", final_path.display(), e);
            let _ = fs::remove_file(&target).await;
            return io_failure(&virtual_path, &e);
        }
    }

    info!("Received {} ({} bytes) from {}", virtual_path, bytes, conn.peer());
    CommandResult::success(TRANSFER_COMPLETE, "Transfer complete.")
}

async fn handle_cmd_dele(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'd', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    match fs::remove_file(&real).await {
        Ok(()) => {
            info!("{} deleted {}", conn.peer(), virtual_path);
            CommandResult::success(FILE_ACTION_OK, "File deleted.")
        }
        Err(e) => io_failure(&virtual_path, &e),
    }
}

// --------------------
// Directories and renames
// --------------------

async fn handle_cmd_mkd(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'm', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    match fs::create_dir(&real).await {
        Ok(()) => CommandResult::success(
            PATH_CREATED,
            &format!("\"{}\" directory created.", virtual_path),
        ),
        Err(e) => io_failure(&virtual_path, &e),
    }
}

async fn handle_cmd_rmd(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'd', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    if virtual_path == "/" {
        return CommandResult::failure(FILE_UNAVAILABLE, "Can't remove root directory.");
    }
    match fs::remove_dir(&real).await {
        Ok(()) => CommandResult::success(FILE_ACTION_OK, "Directory removed."),
        Err(e) => io_failure(&virtual_path, &e),
    }
}

async fn handle_cmd_rnfr(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'f', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    if virtual_path == "/" {
        return CommandResult::failure(FILE_UNAVAILABLE, "Can't rename root directory.");
    }
    match fs::symlink_metadata(&real).await {
        Ok(_) => {
            conn.set_rename_from(real);
            CommandResult::success(PENDING_FURTHER_INFO, "Ready for destination name.")
        }
        Err(e) => io_failure(&virtual_path, &e),
    }
}

async fn handle_cmd_rnto(conn: &mut ConnectionState, name: &str) -> CommandResult {
    let (virtual_path, real) = match resolve(conn, 'f', name).await {
        Ok(resolved) => resolved,
        Err(result) => return result,
    };
    let source = match conn.take_rename_from() {
        Some(source) => source,
        None => return CommandResult::failure(BAD_SEQUENCE, "Bad sequence of commands."),
    };
    match fs::rename(&source, &real).await {
        Ok(()) => CommandResult::success(FILE_ACTION_OK, "Rename successful."),
        Err(e) => io_failure(&virtual_path, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Account;
    use crate::engine::commands::{CommandStatus, parse_command};
    use std::path::Path;

    struct Fixture {
        root: tempfile::TempDir,
        accounts: AccountTable,
        settings: EngineSettings,
        conn: ConnectionState,
        control: Vec<u8>,
    }

    impl Fixture {
        fn new(perm: &str) -> Self {
            let home = tempfile::tempdir().unwrap();
            std::fs::create_dir(home.path().join("docs")).unwrap();
            std::fs::write(home.path().join("a.txt"), b"hello").unwrap();
            let accounts = vec![Account::new("alice", "pw", home.path(), perm)]
                .into_iter()
                .collect();
            Self {
                root: home,
                accounts,
                settings: EngineSettings::default(),
                conn: ConnectionState::new(
                    "127.0.0.1:40000".parse().unwrap(),
                    "127.0.0.1".parse().unwrap(),
                ),
                control: Vec::new(),
            }
        }

        fn home(&self) -> &Path {
            self.root.path()
        }

        async fn send(&mut self, line: &str) -> String {
            let command = parse_command(line);
            let mut ctx = HandlerContext {
                accounts: &self.accounts,
                settings: &self.settings,
                control: &mut self.control,
            };
            let result = handle_command(&mut self.conn, &command, &mut ctx).await;
            result.message.unwrap_or_default()
        }

        async fn login(&mut self) {
            assert!(self.send("USER alice").await.starts_with("331"));
            assert!(self.send("PASS pw").await.starts_with("230"));
        }
    }

    #[tokio::test]
    async fn commands_before_login_are_refused() {
        let mut fx = Fixture::new("elradfmw");
        assert!(fx.send("PWD").await.starts_with("530"));
        assert!(fx.send("NOOP").await.starts_with("200"));
        assert!(fx.send("SYST").await.starts_with("215"));
    }

    #[tokio::test]
    async fn wrong_password_resets_the_login_sequence() {
        let mut fx = Fixture::new("elradfmw");
        fx.send("USER alice").await;
        assert!(fx.send("PASS nope").await.starts_with("530"));
        assert!(fx.send("PASS pw").await.starts_with("503"));
        assert!(!fx.conn.is_logged_in());
    }

    #[tokio::test]
    async fn cwd_stays_inside_home() {
        let mut fx = Fixture::new("elradfmw");
        fx.login().await;
        assert!(fx.send("CWD docs").await.starts_with("250"));
        assert_eq!(fx.conn.cwd(), "/docs");
        assert!(fx.send("CWD ../../..").await.starts_with("250"));
        assert_eq!(fx.conn.cwd(), "/");
        assert!(fx.send("CWD a.txt").await.starts_with("550"));
        assert!(fx.send("PWD").await.contains("\"/\""));
    }

    #[tokio::test]
    async fn missing_permission_flag_is_refused() {
        let mut fx = Fixture::new("elr");
        fx.login().await;
        assert_eq!(fx.send("DELE a.txt").await, "550 Not enough privileges.\r\n");
        assert_eq!(fx.send("MKD new").await, "550 Not enough privileges.\r\n");
        assert!(fx.home().join("a.txt").exists());
    }

    #[tokio::test]
    async fn directory_and_rename_commands() {
        let mut fx = Fixture::new("elradfmw");
        fx.login().await;

        assert!(fx.send("MKD new").await.starts_with("257"));
        assert!(fx.home().join("new").is_dir());
        assert!(fx.send("RNTO b.txt").await.starts_with("503"));
        assert!(fx.send("RNFR a.txt").await.starts_with("350"));
        assert!(fx.send("RNTO new/b.txt").await.starts_with("250"));
        assert!(fx.home().join("new/b.txt").exists());
        assert!(fx.send("RMD new").await.starts_with("550"));
        assert!(fx.send("DELE new/b.txt").await.starts_with("250"));
        assert!(fx.send("RMD new").await.starts_with("250"));
        assert!(fx.send("RMD /").await.starts_with("550"));
    }

    #[tokio::test]
    async fn size_reports_files_only() {
        let mut fx = Fixture::new("elr");
        fx.login().await;
        assert_eq!(fx.send("SIZE a.txt").await, "213 5\r\n");
        assert!(fx.send("SIZE docs").await.starts_with("550"));
        assert!(fx.send("SIZE missing").await.starts_with("550"));
    }

    #[tokio::test]
    async fn transfers_need_a_passive_connection() {
        let mut fx = Fixture::new("elradfmw");
        fx.login().await;
        assert!(fx.send("RETR a.txt").await.starts_with("425"));
        assert!(fx.send("PORT 127,0,0,1,4,1").await.starts_with("502"));
        assert!(fx.control.is_empty());
    }

    #[tokio::test]
    async fn unusable_home_directory_refuses_login() {
        let mut fx = Fixture::new("elr");
        fx.accounts = vec![Account::new("alice", "pw", "/nonexistent/home", "elr")]
            .into_iter()
            .collect();
        fx.send("USER alice").await;
        assert!(fx.send("PASS pw").await.starts_with("530"));
    }

    #[tokio::test]
    async fn quit_closes_the_connection() {
        let mut fx = Fixture::new("");
        let command = parse_command("QUIT");
        let mut ctx = HandlerContext {
            accounts: &fx.accounts,
            settings: &fx.settings,
            control: &mut fx.control,
        };
        let result = handle_command(&mut fx.conn, &command, &mut ctx).await;
        assert_eq!(result.status, CommandStatus::CloseConnection);
    }
}
