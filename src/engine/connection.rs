//! Module `connection`
//!
//! Per-connection state of the built-in engine: who is logged in, where they
//! are, and any half-finished passive or rename sequence.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use crate::auth::Account;

/// State of one control connection.
pub struct ConnectionState {
    peer: SocketAddr,
    local_ip: IpAddr,
    username: Option<String>,
    account: Option<Account>,
    cwd: String,
    passive: Option<TcpListener>,
    rename_from: Option<PathBuf>,
}

impl ConnectionState {
    pub fn new(peer: SocketAddr, local_ip: IpAddr) -> Self {
        Self {
            peer,
            local_ip,
            username: None,
            account: None,
            cwd: "/".to_string(),
            passive: None,
            rename_from: None,
        }
    }

    /// Forgets the logged in account and every pending sequence.
    pub fn logout(&mut self) {
        self.username = None;
        self.account = None;
        self.cwd = "/".to_string();
        self.passive = None;
        self.rename_from = None;
    }

    /// Marks `account` as logged in, starting at its virtual root.
    pub fn login(&mut self, account: Account) {
        self.account = Some(account);
        self.cwd = "/".to_string();
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_ip(&self) -> IpAddr {
        self.local_ip
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    /// Username announced by `USER`, logged in or not.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Real directory the account is confined to.
    pub fn home(&self) -> Option<&Path> {
        self.account.as_ref().map(Account::homedir)
    }

    /// Current virtual directory, always absolute.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    // --------------------
    // Setter methods
    // --------------------

    /// Starts a new login sequence for `username`.
    pub fn set_username(&mut self, username: Option<String>) {
        self.logout();
        self.username = username;
    }

    pub fn set_cwd(&mut self, cwd: String) {
        self.cwd = cwd;
    }

    /// Replaces any earlier passive listener.
    pub fn set_passive(&mut self, listener: TcpListener) {
        self.passive = Some(listener);
    }

    pub fn take_passive(&mut self) -> Option<TcpListener> {
        self.passive.take()
    }

    pub fn set_rename_from(&mut self, path: PathBuf) {
        self.rename_from = Some(path);
    }

    pub fn take_rename_from(&mut self) -> Option<PathBuf> {
        self.rename_from.take()
    }
}
