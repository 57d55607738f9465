//! Logging middleware
//!
//! Provides request logging with credentials redacted.

use log::info;

/// Verbs whose trailing arguments carry a secret or token
const SENSITIVE_VERBS: [(&str, usize); 3] = [("REGISTER", 2), ("LOGIN", 1), ("SESSION", 0)];

/// Log a client connection
pub fn log_connection(client_addr: &str) {
    info!("Client connected: {}", client_addr);
}

/// Log a client command
pub fn log_command(client_addr: &str, raw_command: &str) {
    info!("Client {} sent: {}", client_addr, redact_command(raw_command));
}

/// Replace secrets in a raw command line with `****`.
///
/// Arguments after the last public one of a sensitive verb are masked.
pub fn redact_command(raw_command: &str) -> String {
    let trimmed = raw_command.trim();
    let mut parts = trimmed.split_whitespace();
    let Some(verb) = parts.next() else {
        return String::new();
    };

    let upper = verb.to_ascii_uppercase();
    match SENSITIVE_VERBS.iter().find(|(v, _)| *v == upper) {
        Some((_, public_args)) => {
            let mut out = vec![verb.to_string()];
            out.extend(parts.by_ref().take(*public_args).map(str::to_string));
            if parts.next().is_some() {
                out.push("****".to_string());
            }
            out.join(" ")
        }
        None => trimmed.to_string(),
    }
}
