//! Authentication system
//!
//! Credential storage, password hashing, and input validation.

pub mod password;
pub mod store;
pub mod validator;

pub use store::{CredentialStore, User, UserId};
