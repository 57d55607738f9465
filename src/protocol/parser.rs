//! Command parsing
//!
//! Turns one line of client input into a `Command`. Verbs are
//! case-insensitive; arguments are separated by whitespace.

use crate::protocol::commands::Command;

/// Parses a raw command line received from a client into the `Command` enum.
///
/// Returns `INVALID` if a known verb is misused and `UNKNOWN` for anything else.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "REGISTER" => parse_register(arg),
        "LOGIN" => parse_login(arg),
        "SESSION" => single_arg(arg, "SESSION <token>", Command::SESSION),
        "LOGOUT" => Command::LOGOUT,
        "LIST" => Command::LIST,
        "MKD" => single_arg(arg, "MKD <path>", Command::MKD),
        "READ" => single_arg(arg, "READ <path>", Command::READ),
        "WRITE" => parse_write(arg),
        "DEL" => single_arg(arg, "DEL <path>", Command::DEL),
        "QUIT" => Command::QUIT,
        _ => Command::UNKNOWN,
    }
}

fn single_arg(arg: &str, usage: &str, build: fn(String) -> Command) -> Command {
    if arg.is_empty() {
        Command::INVALID(format!("usage: {}", usage))
    } else {
        build(arg.to_string())
    }
}

fn parse_register(arg: &str) -> Command {
    let mut parts = arg.splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next().map(str::trim)) {
        (Some(user), Some(email), Some(secret))
            if !user.is_empty() && !email.is_empty() && !secret.is_empty() =>
        {
            Command::REGISTER(user.to_string(), email.to_string(), secret.to_string())
        }
        _ => Command::INVALID("usage: REGISTER <username> <email> <secret>".into()),
    }
}

fn parse_login(arg: &str) -> Command {
    let mut parts = arg.splitn(2, char::is_whitespace);
    match (parts.next(), parts.next().map(str::trim)) {
        (Some(user), Some(secret)) if !user.is_empty() && !secret.is_empty() => {
            Command::LOGIN(user.to_string(), secret.to_string())
        }
        _ => Command::INVALID("usage: LOGIN <username> <secret>".into()),
    }
}

fn parse_write(arg: &str) -> Command {
    let mut parts = arg.splitn(2, char::is_whitespace);
    let len = parts.next().and_then(|n| n.parse::<usize>().ok());
    let path = parts.next().map(str::trim).unwrap_or("");

    match len {
        Some(len) if !path.is_empty() => Command::WRITE(len, path.to_string()),
        _ => Command::INVALID("usage: WRITE <length> <path>".into()),
    }
}
