//! Authentication validator
//!
//! Implements FTP user authentication against a snapshotted account table,
//! including username sanitation shared with account management.

use std::fmt;

use crate::auth::account::{Account, AccountTable};
use crate::utils::validation::{has_line_breaks, is_valid_identifier};

pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Login failures reported by the server engine.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginError {
    MalformedInput(String),
    UserNotFound(String),
    InvalidPassword(String),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::MalformedInput(s) => write!(f, "Malformed input: {}", s),
            LoginError::UserNotFound(u) => write!(f, "User not found: {}", u),
            LoginError::InvalidPassword(u) => write!(f, "Invalid password for user: {}", u),
        }
    }
}

impl std::error::Error for LoginError {}

/// Checks that a username is well formed. Existence is checked at password time.
pub fn validate_user(username: &str) -> Result<(), LoginError> {
    if !is_valid_identifier(username, MAX_USERNAME_LENGTH) {
        return Err(LoginError::MalformedInput("Invalid username format".into()));
    }
    Ok(())
}

/// Validates the password for `username` and returns the matching account.
pub fn validate_password<'a>(
    table: &'a AccountTable,
    username: &str,
    password: &str,
) -> Result<&'a Account, LoginError> {
    if password.len() > MAX_PASSWORD_LENGTH || has_line_breaks(password) {
        return Err(LoginError::MalformedInput("Invalid password format".into()));
    }

    match table.get(username) {
        Some(account) if account.password_matches(password) => Ok(account),
        Some(_) => Err(LoginError::InvalidPassword(username.to_string())),
        None => Err(LoginError::UserNotFound(username.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AccountTable {
        vec![
            Account::new("alice", "alice123", "/srv/alice", "elradfmw"),
            Account::new("guest", "", "/srv/pub", ""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn accepts_matching_credentials() {
        let table = table();
        let account = validate_password(&table, "alice", "alice123").unwrap();
        assert_eq!(account.username(), "alice");
    }

    #[test]
    fn distinguishes_unknown_user_and_bad_password() {
        let table = table();
        assert_eq!(
            validate_password(&table, "mallory", "x").unwrap_err(),
            LoginError::UserNotFound("mallory".into())
        );
        assert_eq!(
            validate_password(&table, "alice", "nope").unwrap_err(),
            LoginError::InvalidPassword("alice".into())
        );
    }

    #[test]
    fn empty_password_is_allowed_when_stored_empty() {
        let table = table();
        assert!(validate_password(&table, "guest", "").is_ok());
    }

    #[test]
    fn rejects_malformed_usernames() {
        assert!(validate_user("alice").is_ok());
        assert!(validate_user("").is_err());
        assert!(validate_user(" alice").is_err());
        assert!(validate_user("al\nice").is_err());
        assert!(validate_user("al ice").is_err());
        assert!(validate_user("a\tb").is_err());
        assert!(validate_user("a\x07b").is_err());
    }
}
