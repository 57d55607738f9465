//! Error handlers
//!
//! Maps core errors onto line-protocol replies.

use crate::error::types::{ErrorKind, ServiceError};
use log::{error, warn};

/// Log a failed operation at a level matching its kind
pub fn handle_error(operation: &str, err: &ServiceError) {
    match err.kind() {
        ErrorKind::Transient => error!("{} failed: {}", operation, err),
        _ => warn!("{} rejected: {}", operation, err),
    }
}

/// Convert an error kind to a protocol reply code
pub fn error_to_reply_code(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Unauthenticated => 530,
        ErrorKind::InvalidCredentials => 530,
        ErrorKind::DuplicateIdentity => 550,
        ErrorKind::InvalidInput => 501,
        ErrorKind::InvalidPath => 553,
        ErrorKind::AlreadyExists => 550,
        ErrorKind::NotFound => 550,
        ErrorKind::IsFolder => 550,
        ErrorKind::NotEmpty => 550,
        ErrorKind::Transient => 451,
    }
}

/// Format a full error reply line, e.g. `553 InvalidPath: Invalid path: ../x`
pub fn error_reply(err: &ServiceError) -> String {
    let kind = err.kind();
    format!("{} {}: {}\r\n", error_to_reply_code(kind), kind, err)
}
