use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use rax_ftp_suite::auth::{Account, AuthorizationStore};
use rax_ftp_suite::client::stream::parse_pasv;
use rax_ftp_suite::engine::RaxEngine;
use rax_ftp_suite::server::ListenerController;

/// Raw control connection speaking one reply line per command.
struct Control {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Control {
    fn open(addr: SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let writer = stream.try_clone().unwrap();
        let mut control = Self {
            reader: BufReader::new(stream),
            writer,
        };
        let greeting = control.reply();
        (control, greeting)
    }

    fn reply(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line
    }

    fn cmd(&mut self, command: &str) -> String {
        self.writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .unwrap();
        self.reply()
    }

    fn login(&mut self, user: &str, pass: &str) {
        assert!(self.cmd(&format!("USER {}", user)).starts_with("331"));
        assert!(self.cmd(&format!("PASS {}", pass)).starts_with("230"));
    }

    fn passive(&mut self) -> TcpStream {
        let reply = self.cmd("PASV");
        assert!(reply.starts_with("227"), "{}", reply);
        TcpStream::connect(parse_pasv(&reply).unwrap()).unwrap()
    }
}

fn serve(accounts: Vec<Account>) -> (ListenerController, SocketAddr) {
    let store = AuthorizationStore::new();
    for account in accounts {
        store.add(account).unwrap();
    }
    let mut listener = ListenerController::new(Arc::new(RaxEngine::default()));
    let addr = listener.start("127.0.0.1", 0, &store).unwrap();
    (listener, addr)
}

#[test]
fn greeting_login_and_quit() {
    let home = tempfile::tempdir().unwrap();
    let (mut listener, addr) = serve(vec![Account::new("alice", "pw", home.path(), "elradfmw")]);

    let (mut control, greeting) = Control::open(addr);
    assert!(greeting.starts_with("220"));
    assert!(control.cmd("PWD").starts_with("530"));
    assert!(control.cmd("SYST").starts_with("215"));
    control.login("alice", "pw");
    assert_eq!(control.cmd("PWD"), "257 \"/\" is the current directory.\r\n");
    assert!(control.cmd("QUIT").starts_with("221"));

    listener.stop().unwrap();
}

#[test]
fn account_without_permissions_can_only_log_in() {
    let home = tempfile::tempdir().unwrap();
    fs::write(home.path().join("secret.txt"), b"x").unwrap();
    let (mut listener, addr) = serve(vec![Account::new("nobody", "pw", home.path(), "")]);

    let (mut control, _) = Control::open(addr);
    control.login("nobody", "pw");
    assert_eq!(control.cmd("NLST"), "550 Not enough privileges.\r\n");
    assert_eq!(control.cmd("RETR secret.txt"), "550 Not enough privileges.\r\n");
    assert_eq!(control.cmd("CWD /"), "550 Not enough privileges.\r\n");
    assert!(control.cmd("NOOP").starts_with("200"));

    listener.stop().unwrap();
}

#[test]
fn long_listing_over_passive_connection() {
    let home = tempfile::tempdir().unwrap();
    fs::write(home.path().join("data.txt"), b"hello").unwrap();
    fs::create_dir(home.path().join("sub")).unwrap();
    let (mut listener, addr) = serve(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let (mut control, _) = Control::open(addr);
    control.login("alice", "pw");
    let mut data = control.passive();
    assert!(control.cmd("LIST").starts_with("150"));

    let mut listing = String::new();
    data.read_to_string(&mut listing).unwrap();
    assert!(control.reply().starts_with("226"));

    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('-') && lines[0].ends_with(" data.txt"));
    assert!(lines[1].starts_with('d') && lines[1].ends_with(" sub"));

    listener.stop().unwrap();
}

#[test]
fn paths_are_confined_to_the_home_directory() {
    let home = tempfile::tempdir().unwrap();
    fs::create_dir(home.path().join("sub")).unwrap();
    let (mut listener, addr) = serve(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let (mut control, _) = Control::open(addr);
    control.login("alice", "pw");
    assert!(control.cmd("CWD sub").starts_with("250"));
    assert!(control.cmd("CWD ../../../..").starts_with("250"));
    assert_eq!(control.cmd("PWD"), "257 \"/\" is the current directory.\r\n");
    assert!(control.cmd("SIZE ../../etc/passwd").starts_with("550"));

    listener.stop().unwrap();
}

#[test]
fn stop_closes_open_connections() {
    let home = tempfile::tempdir().unwrap();
    let (mut listener, addr) = serve(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let (mut control, _) = Control::open(addr);
    control.login("alice", "pw");
    listener.stop().unwrap();

    let mut rest = String::new();
    let closed = match control.reader.read_line(&mut rest) {
        Ok(n) => n == 0,
        Err(_) => true,
    };
    assert!(closed);
    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn over_long_commands_and_odd_usernames_are_refused() {
    let home = tempfile::tempdir().unwrap();
    let (mut listener, addr) = serve(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let (mut control, _) = Control::open(addr);
    let flood = format!("NOOP {}", "x".repeat(4096));
    assert!(control.cmd(&flood).starts_with("500"));
    assert!(control.cmd("NOOP").starts_with("200"));

    assert!(control.cmd("USER al ice").starts_with("501"));
    assert!(control.cmd("USER a\tb").starts_with("501"));
    control.login("alice", "pw");

    listener.stop().unwrap();
}
