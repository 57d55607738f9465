//! Server core functionality
//!
//! The TCP listener, connection limit and background session sweep.

pub mod core;

pub use core::Server;
