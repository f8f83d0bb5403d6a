//! Account records
//!
//! Defines server user accounts, their permission flags and the read-only
//! account table handed to the server engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Capability flags of an account, one character per capability.
///
/// The flags are interpreted only by the server engine:
/// `e` change directory, `l` list, `r` retrieve, `a` append, `d` delete,
/// `f` rename, `m` make directory, `w` store. An empty set grants nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(String);

impl Permissions {
    /// Every capability the bundled engine understands.
    pub const FULL: &'static str = "elradfmw";

    pub fn full() -> Self {
        Self(Self::FULL.to_string())
    }

    /// Returns whether the capability flag is present.
    pub fn allows(&self, flag: char) -> bool {
        self.0.contains(flag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Permissions {
    fn from(flags: &str) -> Self {
        Self(flags.to_string())
    }
}

impl From<String> for Permissions {
    fn from(flags: String) -> Self {
        Self(flags)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One server user. Serialized as `{username, password, homedir, perm}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    username: String,
    password: String,
    homedir: PathBuf,
    perm: Permissions,
}

impl Account {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        homedir: impl Into<PathBuf>,
        perm: impl Into<Permissions>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            homedir: homedir.into(),
            perm: perm.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn homedir(&self) -> &Path {
        &self.homedir
    }

    pub fn perm(&self) -> &Permissions {
        &self.perm
    }

    /// Compares the stored secret with a candidate password.
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password == candidate
    }

    /// Projection safe to render: everything but the password.
    pub fn view(&self) -> AccountView {
        AccountView {
            username: self.username.clone(),
            homedir: self.homedir.clone(),
            perm: self.perm.clone(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("homedir", &self.homedir)
            .field("perm", &self.perm)
            .finish()
    }
}

/// Presentation view of an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountView {
    pub username: String,
    pub homedir: PathBuf,
    pub perm: Permissions,
}

/// Immutable username-keyed account table snapshotted for a listener.
#[derive(Clone, Debug, Default)]
pub struct AccountTable {
    accounts: HashMap<String, Account>,
}

impl AccountTable {
    pub fn get(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<Account> for AccountTable {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        Self {
            accounts: iter
                .into_iter()
                .map(|account| (account.username.clone(), account))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_password() {
        let account = Account::new("alice", "s3cret", "/srv/alice", "elr");
        let rendered = format!("{:?}", account);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn permission_flags_are_opaque_characters() {
        let perm = Permissions::from("elr");
        assert!(perm.allows('l'));
        assert!(!perm.allows('w'));
        assert!(Permissions::default().is_empty());
        assert!(Permissions::full().allows('m'));
    }

    #[test]
    fn serializes_with_flat_field_names() {
        let account = Account::new("bob", "pw", "/home/bob", "elradfmw");
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["username"], "bob");
        assert_eq!(json["password"], "pw");
        assert_eq!(json["homedir"], "/home/bob");
        assert_eq!(json["perm"], "elradfmw");
    }
}
