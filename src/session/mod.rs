//! Session management
//!
//! In-memory, token-keyed sessions created at login and destroyed at logout
//! or expiry.

pub mod registry;

pub use registry::{Session, SessionRegistry, SessionToken};
