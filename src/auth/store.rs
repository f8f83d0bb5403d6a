//! Authorization store
//!
//! Insertion-ordered, username-keyed account collection with JSON
//! persistence. A single mutex guards every mutation and snapshot read, so the
//! store can be shared between the control surface and listener startup.

use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::account::{Account, AccountTable, AccountView};
use crate::auth::validator::validate_user;
use crate::error::FtpError;

/// Source of truth for the accounts a listener serves.
#[derive(Default)]
pub struct AuthorizationStore {
    accounts: Mutex<Vec<Account>>,
}

impl AuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Account>> {
        // Every mutation is a single push/remove/replace, so a poisoned
        // vector is still consistent.
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an account, rejecting duplicate or malformed usernames.
    pub fn add(&self, account: Account) -> Result<(), FtpError> {
        validate_user(account.username())
            .map_err(|e| FtpError::InvalidAccount(format!("{}: {:?}", e, account.username())))?;

        let mut accounts = self.guard();
        if accounts.iter().any(|a| a.username() == account.username()) {
            return Err(FtpError::DuplicateAccount(account.username().to_string()));
        }
        info!("Added account {}", account.username());
        accounts.push(account);
        Ok(())
    }

    /// Removes the account with `username`. Returns `false` if it was absent.
    pub fn remove(&self, username: &str) -> bool {
        let mut accounts = self.guard();
        match accounts.iter().position(|a| a.username() == username) {
            Some(index) => {
                accounts.remove(index);
                info!("Removed account {}", username);
                true
            }
            None => false,
        }
    }

    /// Replaces the whole set. Leaves the store untouched if `replacement`
    /// contains duplicate or malformed usernames.
    pub fn replace_all(&self, replacement: Vec<Account>) -> Result<(), FtpError> {
        validate_all(&replacement)?;
        *self.guard() = replacement;
        Ok(())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.guard().iter().any(|a| a.username() == username)
    }

    /// Ordered presentation view, without secrets.
    pub fn list(&self) -> Vec<AccountView> {
        self.guard().iter().map(Account::view).collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Point-in-time copy handed to a listener at startup.
    pub fn snapshot(&self) -> AccountTable {
        self.guard().iter().cloned().collect()
    }

    /// Writes every account, secrets included, as a JSON array. Returns the
    /// number of accounts written.
    pub fn save_to(&self, path: &Path) -> Result<usize, FtpError> {
        let accounts = self.guard().clone();
        let json = serde_json::to_string_pretty(&accounts)
            .map_err(|e| FtpError::Persistence(format!("cannot encode accounts: {}", e)))?;
        fs::write(path, json).map_err(|e| {
            FtpError::Persistence(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!("Saved {} accounts to {}", accounts.len(), path.display());
        Ok(accounts.len())
    }

    /// Replaces the in-memory set with the contents of `path`.
    ///
    /// All-or-nothing: on any read, parse or validation failure the current
    /// accounts are kept.
    pub fn load_from(&self, path: &Path) -> Result<usize, FtpError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            FtpError::Persistence(format!("cannot read {}: {}", path.display(), e))
        })?;
        let loaded: Vec<Account> = serde_json::from_str(&raw).map_err(|e| {
            warn!("Rejected account file {}: {}", path.display(), e);
            FtpError::Persistence(format!("malformed {}: {}", path.display(), e))
        })?;
        validate_all(&loaded)
            .map_err(|e| FtpError::Persistence(format!("{}: {}", path.display(), e)))?;

        let count = loaded.len();
        *self.guard() = loaded;
        info!("Loaded {} accounts from {}", count, path.display());
        Ok(count)
    }
}

fn validate_all(accounts: &[Account]) -> Result<(), FtpError> {
    let mut seen = HashSet::new();
    for account in accounts {
        validate_user(account.username())
            .map_err(|e| FtpError::InvalidAccount(format!("{}: {:?}", e, account.username())))?;
        if !seen.insert(account.username()) {
            return Err(FtpError::DuplicateAccount(account.username().to_string()));
        }
    }
    Ok(())
}
