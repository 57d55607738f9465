//! Command handlers
//!
//! Each handler runs one parsed command against the workspace service on
//! behalf of a client connection and builds the reply. Failures from the
//! service are logged and turned into `<code> <Kind>: <message>` replies.

use log::info;

use crate::client::Client;
use crate::error::ServiceError;
use crate::error::handlers::{error_reply, handle_error};
use crate::protocol::responses::{
    ACTION_OK, BAD_ARGUMENTS, CLOSING, CREATED_USER, DATA_FOLLOWS, LOGGED_IN, PATH_CREATED,
    SYNTAX_ERROR, TRANSFER_COMPLETE, format_response,
};
use crate::protocol::{Command, CommandResult};
use crate::service::WorkspaceService;
use crate::storage::EntryKind;

/// Dispatches a parsed command to its handler.
///
/// `WRITE` carries a payload that only the connection loop can read, so it
/// goes through [`handle_write`] instead.
pub async fn handle_command(
    client: &mut Client,
    command: &Command,
    service: &WorkspaceService,
) -> CommandResult {
    match command {
        Command::REGISTER(username, email, secret) => {
            handle_cmd_register(service, username, email, secret).await
        }
        Command::LOGIN(username, secret) => handle_cmd_login(client, service, username, secret).await,
        Command::SESSION(token) => handle_cmd_session(client, service, token),
        Command::LOGOUT => handle_cmd_logout(client, service),
        Command::LIST => handle_cmd_list(client, service).await,
        Command::MKD(path) => handle_cmd_mkd(client, service, path).await,
        Command::READ(path) => handle_cmd_read(client, service, path).await,
        Command::DEL(path) => handle_cmd_del(client, service, path).await,
        Command::QUIT => handle_cmd_quit(client),
        Command::WRITE(_, path) => CommandResult::failure(
            "WRITE without payload",
            format_response(BAD_ARGUMENTS, &format!("No payload read for \"{}\"", path)),
        ),
        Command::INVALID(usage) => CommandResult::failure(
            usage.clone(),
            format_response(BAD_ARGUMENTS, &format!("InvalidInput: {}", usage)),
        ),
        Command::UNKNOWN => handle_cmd_unknown(),
    }
}

/// Handles WRITE once its payload has been read off the connection.
pub async fn handle_write(
    client: &Client,
    service: &WorkspaceService,
    path: &str,
    payload: Vec<u8>,
) -> CommandResult {
    let content = match String::from_utf8(payload) {
        Ok(content) => content,
        Err(_) => {
            return CommandResult::failure(
                "payload is not UTF-8",
                format_response(BAD_ARGUMENTS, "InvalidInput: content must be UTF-8 text"),
            );
        }
    };

    match service.write_file(client.token(), path, content).await {
        Ok(written) => CommandResult::success(format_response(
            TRANSFER_COMPLETE,
            &format!("\"{}\" saved", written),
        )),
        Err(e) => failed("WRITE", &e),
    }
}

async fn handle_cmd_register(
    service: &WorkspaceService,
    username: &str,
    email: &str,
    secret: &str,
) -> CommandResult {
    match service.register(username, email, secret).await {
        Ok(id) => CommandResult::success(format_response(
            CREATED_USER,
            &format!("Registered user {}", id),
        )),
        Err(e) => failed("REGISTER", &e),
    }
}

/// Handles LOGIN: a success replaces any session this connection held.
async fn handle_cmd_login(
    client: &mut Client,
    service: &WorkspaceService,
    username: &str,
    secret: &str,
) -> CommandResult {
    match service.login(username, secret).await {
        Ok(token) => {
            let reply = format_response(LOGGED_IN, token.as_str());
            if let Some(previous) = client.set_session(token, username.to_string()) {
                service.logout(previous.as_str());
            }
            CommandResult::success(reply)
        }
        Err(e) => failed("LOGIN", &e),
    }
}

/// Handles SESSION: adopts a token issued earlier, possibly on another connection.
fn handle_cmd_session(client: &mut Client, service: &WorkspaceService, token: &str) -> CommandResult {
    match service.session(token) {
        Ok(session) => {
            info!(
                "Client {} resumed session of user {}",
                client.client_addr(),
                session.username
            );
            let reply = format_response(
                LOGGED_IN,
                &format!("Session resumed for {}", session.username),
            );
            client.set_session(token.to_string().into(), session.username);
            CommandResult::success(reply)
        }
        Err(e) => failed("SESSION", &e),
    }
}

/// Handles LOGOUT: always succeeds, even without a session.
fn handle_cmd_logout(client: &mut Client, service: &WorkspaceService) -> CommandResult {
    if let Some(token) = client.logout() {
        service.logout(token.as_str());
    }
    CommandResult::success(format_response(CLOSING, "Logged out"))
}

async fn handle_cmd_list(client: &Client, service: &WorkspaceService) -> CommandResult {
    match service.list_entries(client.token()).await {
        Ok(entries) => {
            let mut reply = format_response(DATA_FOLLOWS, &format!("{} entries", entries.len()));
            for entry in &entries {
                let tag = match entry.kind {
                    EntryKind::Folder => 'D',
                    EntryKind::File => 'F',
                };
                reply.push_str(&format!("{} {}\r\n", tag, entry.path));
            }
            reply.push_str(&format_response(TRANSFER_COMPLETE, "End of listing"));
            CommandResult::success(reply)
        }
        Err(e) => failed("LIST", &e),
    }
}

async fn handle_cmd_mkd(client: &Client, service: &WorkspaceService, path: &str) -> CommandResult {
    match service.create_folder(client.token(), path).await {
        Ok(created) => {
            CommandResult::success(format_response(PATH_CREATED, &format!("\"{}\" created", created)))
        }
        Err(e) => failed("MKD", &e),
    }
}

/// Handles READ: the byte count line, the raw content, then a completion line.
async fn handle_cmd_read(client: &Client, service: &WorkspaceService, path: &str) -> CommandResult {
    match service.read_file(client.token(), path).await {
        Ok(content) => {
            let mut reply = format_response(DATA_FOLLOWS, &format!("{} bytes", content.len()));
            reply.push_str(&content);
            reply.push_str(&format_response(TRANSFER_COMPLETE, "Transfer complete"));
            CommandResult::success(reply)
        }
        Err(e) => failed("READ", &e),
    }
}

async fn handle_cmd_del(client: &Client, service: &WorkspaceService, path: &str) -> CommandResult {
    match service.delete_entry(client.token(), path).await {
        Ok(deleted) => {
            CommandResult::success(format_response(ACTION_OK, &format!("\"{}\" deleted", deleted)))
        }
        Err(e) => failed("DEL", &e),
    }
}

/// Handles QUIT. The session stays valid so it can be resumed elsewhere.
fn handle_cmd_quit(client: &mut Client) -> CommandResult {
    client.logout();
    CommandResult::close(format_response(CLOSING, "Goodbye"))
}

fn handle_cmd_unknown() -> CommandResult {
    CommandResult::failure(
        "Unknown command",
        format_response(SYNTAX_ERROR, "Unknown command"),
    )
}

fn failed(operation: &str, err: &ServiceError) -> CommandResult {
    handle_error(operation, err);
    CommandResult::failure(err.kind().as_str(), error_reply(err))
}
