//! Protocol replies
//!
//! Reply codes and the fixed reply lines.

pub const DATA_FOLLOWS: u16 = 150;
pub const CREATED_USER: u16 = 201;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const LOGGED_IN: u16 = 230;
pub const ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const TOO_MANY_CONNECTIONS: u16 = 421;
pub const SYNTAX_ERROR: u16 = 500;
pub const BAD_ARGUMENTS: u16 = 501;

pub const GREETING: &str = "220 Vellum workspace ready\r\n";
pub const TOO_MANY: &str = "421 Too many connections\r\n";
pub const COMMAND_TOO_LONG: &str = "500 Command too long\r\n";

/// Format a single reply line
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_lines_end_with_crlf() {
        assert_eq!(format_response(CLOSING, "Goodbye"), "221 Goodbye\r\n");
        assert!(GREETING.starts_with(&READY.to_string()));
        assert!(TOO_MANY.starts_with(&TOO_MANY_CONNECTIONS.to_string()));
    }
}
