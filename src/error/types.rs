//! Error types
//!
//! Defines domain-specific error types for each component of the workspace
//! server, plus the abstract `ErrorKind` every failure is reported as.

use std::fmt;
use std::io;

use thiserror::Error;

/// Transport-independent classification of every failure the core returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    InvalidCredentials,
    DuplicateIdentity,
    InvalidInput,
    InvalidPath,
    AlreadyExists,
    NotFound,
    IsFolder,
    NotEmpty,
    /// Storage timed out or was unavailable; the caller may retry.
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "Unauthenticated",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::DuplicateIdentity => "DuplicateIdentity",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidPath => "InvalidPath",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::IsFolder => "IsFolder",
            ErrorKind::NotEmpty => "NotEmpty",
            ErrorKind::Transient => "Transient",
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential store errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed input: {0}")]
    InvalidInput(String),

    #[error("Username '{0}' is already taken")]
    DuplicateIdentity(String),

    /// Deliberately carries no detail so unknown users and wrong secrets
    /// look the same to the caller.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Credential store busy: {0}")]
    Busy(String),

    #[error("Credential store timed out after {0} ms")]
    Timeout(u64),

    #[error("Credential store error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidInput(_) => ErrorKind::InvalidInput,
            AuthError::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::Busy(_) | AuthError::Timeout(_) | AuthError::Database(_) => {
                ErrorKind::Transient
            }
        }
    }
}

/// Workspace storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Path is a folder: {0}")]
    IsFolder(String),

    #[error("Folder is not empty: {0}")]
    NotEmpty(String),

    #[error("File is not valid UTF-8 text: {0}")]
    NotText(String),

    #[error("Storage operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Storage operation abandoned before commit: {0}")]
    Abandoned(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidPath(_) => ErrorKind::InvalidPath,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::IsFolder(_) => ErrorKind::IsFolder,
            StorageError::NotEmpty(_) => ErrorKind::NotEmpty,
            StorageError::NotText(_) => ErrorKind::InvalidInput,
            StorageError::Timeout(_) | StorageError::Abandoned(_) | StorageError::Io(_) => {
                ErrorKind::Transient
            }
        }
    }
}

/// Error returned by every `WorkspaceService` operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Unauthenticated => ErrorKind::Unauthenticated,
            ServiceError::Auth(e) => e.kind(),
            ServiceError::Storage(e) => e.kind(),
        }
    }
}

/// Failures while bringing the server up
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to open workspace service: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to bind {0}: {1}")]
    Bind(String, #[source] io::Error),
}
