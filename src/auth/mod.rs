//! Authentication system
//!
//! Holds server accounts, persists them, and validates logins against the
//! table a listener was started with.

pub mod account;
pub mod store;
pub mod validator;

pub use account::{Account, AccountTable, AccountView, Permissions};
pub use store::AuthorizationStore;
pub use validator::{LoginError, validate_password, validate_user};
