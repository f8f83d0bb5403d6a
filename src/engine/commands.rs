//! Module `commands`
//!
//! FTP command parsing and the result type every handler returns.

use crate::engine::responses::format_response;

/// An FTP command parsed from one control line.
///
/// Commands that require arguments store them as `String` variants; a known
/// command missing its argument parses as `INVALID`.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    QUIT,
    SYST,
    TYPE(String),
    NOOP,
    PWD,
    CWD(String),
    CDUP,
    PASV,
    PORT,
    LIST(Option<String>),
    NLST(Option<String>),
    SIZE(String),
    RETR(String),
    STOR(String),
    APPE(String),
    DELE(String),
    MKD(String),
    RMD(String),
    RNFR(String),
    RNTO(String),
    INVALID(String),
    UNKNOWN(String),
}

impl Command {
    /// Verb used in logs. Never includes arguments.
    pub fn name(&self) -> &str {
        match self {
            Command::USER(_) => "USER",
            Command::PASS(_) => "PASS",
            Command::QUIT => "QUIT",
            Command::SYST => "SYST",
            Command::TYPE(_) => "TYPE",
            Command::NOOP => "NOOP",
            Command::PWD => "PWD",
            Command::CWD(_) => "CWD",
            Command::CDUP => "CDUP",
            Command::PASV => "PASV",
            Command::PORT => "PORT",
            Command::LIST(_) => "LIST",
            Command::NLST(_) => "NLST",
            Command::SIZE(_) => "SIZE",
            Command::RETR(_) => "RETR",
            Command::STOR(_) => "STOR",
            Command::APPE(_) => "APPE",
            Command::DELE(_) => "DELE",
            Command::MKD(_) => "MKD",
            Command::RMD(_) => "RMD",
            Command::RNFR(_) => "RNFR",
            Command::RNTO(_) => "RNTO",
            Command::INVALID(verb) | Command::UNKNOWN(verb) => verb,
        }
    }

    /// Whether the command is accepted before login.
    pub fn allowed_anonymously(&self) -> bool {
        matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::QUIT
                | Command::SYST
                | Command::NOOP
                | Command::INVALID(_)
                | Command::UNKNOWN(_)
        )
    }
}

/// Outcome status of executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Full result of a command: its status plus the reply to send, if any.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success(code: u16, message: &str) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(format_response(code, message)),
        }
    }

    pub fn failure(code: u16, message: &str) -> Self {
        Self {
            status: CommandStatus::Failure(message.to_string()),
            message: Some(format_response(code, message)),
        }
    }

    pub fn close(code: u16, message: &str) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            message: Some(format_response(code, message)),
        }
    }
}

/// Parses a raw control line into a `Command`.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim_end_matches(['\r', '\n']).trim_start();
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    let required = |build: fn(String) -> Command| {
        if arg.is_empty() {
            Command::INVALID(cmd.clone())
        } else {
            build(arg.to_string())
        }
    };
    // LIST flags such as `-la` are accepted and ignored.
    let optional_path = || {
        if arg.is_empty() || arg.starts_with('-') {
            None
        } else {
            Some(arg.to_string())
        }
    };

    match cmd.as_str() {
        "USER" => required(Command::USER),
        "PASS" => Command::PASS(arg.to_string()),
        "QUIT" => Command::QUIT,
        "SYST" => Command::SYST,
        "TYPE" => required(Command::TYPE),
        "NOOP" => Command::NOOP,
        "PWD" | "XPWD" => Command::PWD,
        "CWD" | "XCWD" => required(Command::CWD),
        "CDUP" | "XCUP" => Command::CDUP,
        "PASV" => Command::PASV,
        "PORT" => Command::PORT,
        "LIST" => Command::LIST(optional_path()),
        "NLST" => Command::NLST(optional_path()),
        "SIZE" => required(Command::SIZE),
        "RETR" => required(Command::RETR),
        "STOR" => required(Command::STOR),
        "APPE" => required(Command::APPE),
        "DELE" => required(Command::DELE),
        "MKD" | "XMKD" => required(Command::MKD),
        "RMD" | "XRMD" => required(Command::RMD),
        "RNFR" => required(Command::RNFR),
        "RNTO" => required(Command::RNTO),
        _ => Command::UNKNOWN(cmd.clone()),
    }
}
