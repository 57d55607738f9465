//! Line protocol
//!
//! Command parsing, reply formatting and dispatch to the workspace service.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{Command, CommandResult, CommandStatus};
pub use handlers::{handle_command, handle_write};
pub use parser::parse_command;
