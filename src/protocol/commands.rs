//! Module `commands`
//!
//! Data structures for parsed client commands and the results of running them.

/// A command parsed from one line of client input.
///
/// Commands that need arguments carry them as `String`s. Secrets are the
/// remainder of the line and may contain spaces.
#[derive(Debug, PartialEq)]
pub enum Command {
    REGISTER(String, String, String), // Username, email, secret
    LOGIN(String, String),            // Username, secret
    SESSION(String),                  // Resume an existing session token
    LOGOUT,
    LIST,
    MKD(String),          // Create folder
    READ(String),         // Read file
    WRITE(usize, String), // Byte length of the following payload, path
    DEL(String),          // Delete file or empty folder
    QUIT,
    /// Known verb with missing or malformed arguments
    INVALID(String),
    UNKNOWN,
}

impl Command {
    /// Verb name for log lines; arguments are never included.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::REGISTER(..) => "REGISTER",
            Command::LOGIN(..) => "LOGIN",
            Command::SESSION(_) => "SESSION",
            Command::LOGOUT => "LOGOUT",
            Command::LIST => "LIST",
            Command::MKD(_) => "MKD",
            Command::READ(_) => "READ",
            Command::WRITE(..) => "WRITE",
            Command::DEL(_) => "DEL",
            Command::QUIT => "QUIT",
            Command::INVALID(_) => "INVALID",
            Command::UNKNOWN => "UNKNOWN",
        }
    }
}

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Status plus the full reply text to send back.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success(message: String) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(message),
        }
    }

    pub fn failure(reason: impl Into<String>, message: String) -> Self {
        Self {
            status: CommandStatus::Failure(reason.into()),
            message: Some(message),
        }
    }

    pub fn close(message: String) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            message: Some(message),
        }
    }
}
