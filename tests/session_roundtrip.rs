use std::fs;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rax_ftp_suite::auth::{Account, AuthorizationStore};
use rax_ftp_suite::client::{
    DirEntry, FtpConnection, FtpStream, Session, SessionEvent, SessionOutcome, SessionReply,
    SessionState, TcpConnector,
};
use rax_ftp_suite::engine::RaxEngine;
use rax_ftp_suite::error::FtpError;
use rax_ftp_suite::server::ListenerController;
use rax_ftp_suite::task::{TaskEvent, TaskRunner};
use tokio::sync::mpsc::UnboundedReceiver;

type Events = UnboundedReceiver<TaskEvent<SessionReply>>;

fn start_server(accounts: Vec<Account>) -> (ListenerController, SocketAddr) {
    let store = AuthorizationStore::new();
    for account in accounts {
        store.add(account).unwrap();
    }
    let mut listener = ListenerController::new(Arc::new(RaxEngine::default()));
    let addr = listener.start("127.0.0.1", 0, &store).unwrap();
    (listener, addr)
}

fn new_session() -> (Session, Events) {
    let (runner, events) = TaskRunner::new();
    let connector = TcpConnector::new(Some(Duration::from_secs(10)));
    (Session::new(Arc::new(connector), runner), events)
}

/// Drives the session until it reports a terminal event, counting progress.
fn settle(session: &mut Session, events: &mut Events) -> (SessionEvent, usize) {
    let mut progress = 0;
    loop {
        let event = events.blocking_recv().expect("runner alive");
        match session.handle_event(event) {
            Some(SessionEvent::Progress { .. }) => progress += 1,
            Some(terminal) => return (terminal, progress),
            None => {}
        }
    }
}

fn completed(session: &mut Session, events: &mut Events) -> SessionOutcome {
    match settle(session, events).0 {
        SessionEvent::Completed { outcome, .. } => outcome,
        other => panic!("expected completion, got {:?}", other),
    }
}

fn failed(session: &mut Session, events: &mut Events) -> FtpError {
    match settle(session, events).0 {
        SessionEvent::Failed { error, .. } => error,
        other => panic!("expected failure, got {:?}", other),
    }
}

fn connect(session: &mut Session, events: &mut Events, addr: SocketAddr, user: &str, pass: &str) {
    session.connect("127.0.0.1", addr.port(), user, pass).unwrap();
    assert_eq!(
        completed(session, events),
        SessionOutcome::Connected {
            host: "127.0.0.1".into(),
            port: addr.port()
        }
    );
    assert_eq!(session.state(), SessionState::Connected);
}

fn write_local(dir: &Path, name: &str, len: usize) -> Vec<u8> {
    let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    fs::write(dir.join(name), &content).unwrap();
    content
}

#[test]
fn upload_list_download_and_disconnect() {
    let home = tempfile::tempdir().unwrap();
    let local = tempfile::tempdir().unwrap();
    fs::create_dir(home.path().join("docs")).unwrap();
    let (mut listener, addr) = start_server(vec![Account::new(
        "alice",
        "alice123",
        home.path(),
        "elradfmw",
    )]);

    let (mut session, mut events) = new_session();
    connect(&mut session, &mut events, addr, "alice", "alice123");

    let content = write_local(local.path(), "notes.bin", 100_000);
    session
        .upload(&local.path().join("notes.bin"), "notes.bin")
        .unwrap();
    let (event, progress) = settle(&mut session, &mut events);
    match event {
        SessionEvent::Completed {
            outcome: SessionOutcome::Uploaded { remote_name, bytes },
            ..
        } => {
            assert_eq!(remote_name, "notes.bin");
            assert_eq!(bytes, content.len() as u64);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(progress > 1);
    assert_eq!(fs::read(home.path().join("notes.bin")).unwrap(), content);

    session.list_remote().unwrap();
    assert_eq!(
        completed(&mut session, &mut events),
        SessionOutcome::Listing(vec![
            DirEntry { name: "docs".into(), size: None },
            DirEntry { name: "notes.bin".into(), size: Some(content.len() as u64) },
        ])
    );

    let copy = local.path().join("copy.bin");
    session.download("notes.bin", &copy).unwrap();
    match completed(&mut session, &mut events) {
        SessionOutcome::Downloaded { bytes, .. } => assert_eq!(bytes, content.len() as u64),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(fs::read(&copy).unwrap(), content);

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    let close = events.blocking_recv().unwrap();
    assert_eq!(close.operation, "disconnect");
    assert!(close.is_terminal());

    listener.stop().unwrap();
}

#[test]
fn wrong_password_is_an_auth_error() {
    let home = tempfile::tempdir().unwrap();
    let (mut listener, addr) = start_server(vec![Account::new("alice", "right", home.path(), "elr")]);

    let (mut session, mut events) = new_session();
    session.connect("127.0.0.1", addr.port(), "alice", "wrong").unwrap();
    let error = failed(&mut session, &mut events);
    assert_eq!(error.kind(), "AuthError");
    assert_eq!(session.state(), SessionState::Disconnected);

    listener.stop().unwrap();
}

#[test]
fn read_only_account_cannot_upload_but_stays_connected() {
    let home = tempfile::tempdir().unwrap();
    let local = tempfile::tempdir().unwrap();
    fs::write(home.path().join("readme.txt"), b"read me").unwrap();
    let (mut listener, addr) = start_server(vec![Account::new("guest", "guest", home.path(), "elr")]);

    let (mut session, mut events) = new_session();
    connect(&mut session, &mut events, addr, "guest", "guest");

    write_local(local.path(), "upload.bin", 10);
    session
        .upload(&local.path().join("upload.bin"), "upload.bin")
        .unwrap();
    let error = failed(&mut session, &mut events);
    assert_eq!(error.kind(), "ProtocolError");
    assert!(error.to_string().contains("550"));
    assert_eq!(session.state(), SessionState::Connected);
    assert!(!home.path().join("upload.bin").exists());

    session.list_remote().unwrap();
    assert_eq!(
        completed(&mut session, &mut events),
        SessionOutcome::Listing(vec![DirEntry { name: "readme.txt".into(), size: Some(7) }])
    );

    session.download("readme.txt", &local.path().join("readme.txt")).unwrap();
    assert!(matches!(
        completed(&mut session, &mut events),
        SessionOutcome::Downloaded { bytes: 7, .. }
    ));

    session.disconnect().unwrap();
    listener.stop().unwrap();
}

#[test]
fn missing_remote_file_leaves_no_partial_download() {
    let home = tempfile::tempdir().unwrap();
    let local = tempfile::tempdir().unwrap();
    let (mut listener, addr) = start_server(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let (mut session, mut events) = new_session();
    connect(&mut session, &mut events, addr, "alice", "pw");

    let target = local.path().join("ghost.txt");
    session.download("ghost.txt", &target).unwrap();
    let error = failed(&mut session, &mut events);
    assert_eq!(error.kind(), "ProtocolError");
    assert!(!target.exists());
    assert_eq!(session.state(), SessionState::Connected);

    session.disconnect().unwrap();
    listener.stop().unwrap();
}

#[test]
fn refused_connection_is_a_network_error() {
    let port = {
        let vacant = TcpListener::bind("127.0.0.1:0").unwrap();
        vacant.local_addr().unwrap().port()
    };

    let (mut session, mut events) = new_session();
    session.connect("127.0.0.1", port, "alice", "pw").unwrap();
    let error = failed(&mut session, &mut events);
    assert_eq!(error.kind(), "NetworkError");
    assert_eq!(session.state(), SessionState::Disconnected);
}

/// Local sink that refuses every write.
struct FullDisk;

impl Write for FullDisk {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("no space left on device"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn control_connection_stays_in_step_after_an_aborted_download() {
    let home = tempfile::tempdir().unwrap();
    let content = write_local(home.path(), "big.bin", 1_000_000);
    let (mut listener, addr) = start_server(vec![Account::new("alice", "pw", home.path(), "elr")]);

    let mut ftp = FtpStream::connect("127.0.0.1", addr.port(), Some(Duration::from_secs(10)))
        .unwrap();
    ftp.login("alice", "pw").unwrap();

    assert!(ftp.retrieve("big.bin", &mut FullDisk, &mut |_| {}).is_err());

    assert_eq!(ftp.list().unwrap(), vec!["big.bin".to_string()]);
    assert_eq!(ftp.size("big.bin").unwrap(), Some(content.len() as u64));

    let mut copy = Vec::new();
    let bytes = ftp.retrieve("big.bin", &mut copy, &mut |_| {}).unwrap();
    assert_eq!(bytes, content.len() as u64);
    assert_eq!(copy, content);

    ftp.quit().unwrap();
    listener.stop().unwrap();
}

#[cfg(unix)]
#[test]
fn session_is_usable_after_a_failed_upload() {
    let home = tempfile::tempdir().unwrap();
    let local = tempfile::tempdir().unwrap();
    fs::write(home.path().join("readme.txt"), b"read me").unwrap();
    let (mut listener, addr) = start_server(vec![Account::new(
        "alice",
        "pw",
        home.path(),
        "elradfmw",
    )]);

    let (mut session, mut events) = new_session();
    connect(&mut session, &mut events, addr, "alice", "pw");

    // A directory opens fine on unix but fails on the first read.
    let unreadable = local.path().join("folder");
    fs::create_dir(&unreadable).unwrap();
    session.upload(&unreadable, "folder").unwrap();
    let error = failed(&mut session, &mut events);
    assert_eq!(error.kind(), "LocalIoError");
    assert_eq!(session.state(), SessionState::Connected);

    session.list_remote().unwrap();
    match completed(&mut session, &mut events) {
        SessionOutcome::Listing(entries) => assert!(entries.contains(&DirEntry {
            name: "readme.txt".into(),
            size: Some(7),
        })),
        other => panic!("unexpected {:?}", other),
    }

    let copy = local.path().join("copy.txt");
    session.download("readme.txt", &copy).unwrap();
    assert!(matches!(
        completed(&mut session, &mut events),
        SessionOutcome::Downloaded { bytes: 7, .. }
    ));
    assert_eq!(fs::read(&copy).unwrap(), b"read me");

    session.disconnect().unwrap();
    listener.stop().unwrap();
}
