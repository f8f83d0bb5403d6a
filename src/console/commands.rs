//! Console command parsing
//!
//! One line of operator input becomes one `ConsoleCommand`. Verbs are
//! case-insensitive; arguments are split on whitespace.

use std::fmt;

use crate::auth::Permissions;

/// An operator command.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open {
        host: String,
        port: Option<u16>,
        username: String,
        password: String,
    },
    Close,
    Ls,
    Lls,
    Lcd(String),
    Put {
        local: String,
        remote: Option<String>,
    },
    Get {
        remote: String,
        local: Option<String>,
    },
    Status,
    UserAdd {
        username: String,
        password: String,
        homedir: String,
        perm: Permissions,
    },
    UserDel(String),
    Users,
    Save(Option<String>),
    Load(Option<String>),
    Start {
        address: Option<String>,
        port: Option<u16>,
    },
    Stop,
    Help,
    Quit,
    Empty,
}

/// Why a line could not be parsed.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    Unknown(String),
    Usage(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Unknown(verb) => write!(f, "Unknown command: {} (try `help`)", verb),
            ParseError::Usage(usage) => write!(f, "Usage: {}", usage),
        }
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
Remote session:
  open HOST [PORT] USER PASS   connect and log in
  close                        disconnect
  ls                           list the remote directory
  put LOCAL [REMOTE]           upload a file
  get REMOTE [LOCAL]           download a file
Local files:
  lls                          list the local directory
  lcd PATH                     change the local directory
Accounts:
  useradd USER PASS HOME [PERM]  add an account (default perm elradfmw)
  userdel USER                 remove an account
  users                        list accounts
  save [PATH] / load [PATH]    persist or restore accounts
Server:
  start [ADDR] [PORT]          start the FTP listener
  stop                         stop the FTP listener
Other:
  status                       show session and listener state
  help                         show this text
  quit                         exit";

/// Parses one input line.
pub fn parse_command(raw: &str) -> Result<ConsoleCommand, ParseError> {
    let mut words = raw.split_whitespace();
    let verb = match words.next() {
        Some(verb) => verb.to_ascii_lowercase(),
        None => return Ok(ConsoleCommand::Empty),
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.as_str(), args.as_slice()) {
        ("open", [host, username, password]) => ConsoleCommand::Open {
            host: host.to_string(),
            port: None,
            username: username.to_string(),
            password: password.to_string(),
        },
        ("open", [host, port, username, password]) => ConsoleCommand::Open {
            host: host.to_string(),
            port: Some(parse_port(port, "open HOST [PORT] USER PASS")?),
            username: username.to_string(),
            password: password.to_string(),
        },
        ("open", _) => return Err(ParseError::Usage("open HOST [PORT] USER PASS")),
        ("close", []) => ConsoleCommand::Close,
        ("ls", []) => ConsoleCommand::Ls,
        ("lls", []) => ConsoleCommand::Lls,
        ("lcd", [path]) => ConsoleCommand::Lcd(path.to_string()),
        ("lcd", _) => return Err(ParseError::Usage("lcd PATH")),
        ("put", [local]) => ConsoleCommand::Put {
            local: local.to_string(),
            remote: None,
        },
        ("put", [local, remote]) => ConsoleCommand::Put {
            local: local.to_string(),
            remote: Some(remote.to_string()),
        },
        ("put", _) => return Err(ParseError::Usage("put LOCAL [REMOTE]")),
        ("get", [remote]) => ConsoleCommand::Get {
            remote: remote.to_string(),
            local: None,
        },
        ("get", [remote, local]) => ConsoleCommand::Get {
            remote: remote.to_string(),
            local: Some(local.to_string()),
        },
        ("get", _) => return Err(ParseError::Usage("get REMOTE [LOCAL]")),
        ("status", []) => ConsoleCommand::Status,
        ("useradd", [username, password, homedir]) => ConsoleCommand::UserAdd {
            username: username.to_string(),
            password: password.to_string(),
            homedir: homedir.to_string(),
            perm: Permissions::full(),
        },
        ("useradd", [username, password, homedir, perm]) => ConsoleCommand::UserAdd {
            username: username.to_string(),
            password: password.to_string(),
            homedir: homedir.to_string(),
            perm: Permissions::from(*perm),
        },
        ("useradd", _) => return Err(ParseError::Usage("useradd USER PASS HOME [PERM]")),
        ("userdel", [username]) => ConsoleCommand::UserDel(username.to_string()),
        ("userdel", _) => return Err(ParseError::Usage("userdel USER")),
        ("users", []) => ConsoleCommand::Users,
        ("save", []) => ConsoleCommand::Save(None),
        ("save", [path]) => ConsoleCommand::Save(Some(path.to_string())),
        ("save", _) => return Err(ParseError::Usage("save [PATH]")),
        ("load", []) => ConsoleCommand::Load(None),
        ("load", [path]) => ConsoleCommand::Load(Some(path.to_string())),
        ("load", _) => return Err(ParseError::Usage("load [PATH]")),
        ("start", []) => ConsoleCommand::Start {
            address: None,
            port: None,
        },
        ("start", [only]) => match only.parse::<u16>() {
            Ok(port) => ConsoleCommand::Start {
                address: None,
                port: Some(port),
            },
            Err(_) => ConsoleCommand::Start {
                address: Some(only.to_string()),
                port: None,
            },
        },
        ("start", [address, port]) => ConsoleCommand::Start {
            address: Some(address.to_string()),
            port: Some(parse_port(port, "start [ADDR] [PORT]")?),
        },
        ("start", _) => return Err(ParseError::Usage("start [ADDR] [PORT]")),
        ("stop", []) => ConsoleCommand::Stop,
        ("help" | "?", _) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("close" | "ls" | "lls" | "status" | "users" | "stop" | "quit" | "exit", _) => {
            return Err(ParseError::Usage("command takes no arguments"));
        }
        _ => return Err(ParseError::Unknown(verb)),
    };
    Ok(command)
}

fn parse_port(raw: &str, usage: &'static str) -> Result<u16, ParseError> {
    raw.parse().map_err(|_| ParseError::Usage(usage))
}
