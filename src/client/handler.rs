use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::Client;
use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::error::handlers::error_reply;
use crate::middleware::logging::log_command;
use crate::protocol::responses::{BAD_ARGUMENTS, COMMAND_TOO_LONG, format_response};
use crate::protocol::{Command, CommandStatus, handle_command, handle_write, parse_command};
use crate::service::WorkspaceService;

/// Outcome of reading one command line.
enum LineRead {
    Line(String),
    TooLong,
    Eof,
}

/// Drives one client connection until it quits or disconnects.
///
/// - Reads CRLF (or LF) terminated command lines, bounded by `max_command_length`.
/// - Reads the raw payload that follows a `WRITE` header.
/// - Dispatches everything else through `handle_command`.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    service: Arc<WorkspaceService>,
    config: Arc<ServerConfig>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut client = Client::new(client_addr);
    let peer = client_addr.to_string();

    loop {
        let line = match read_command_line(&mut reader, config.max_command_length).await {
            Ok(LineRead::Line(line)) => line,
            Ok(LineRead::TooLong) => {
                warn!("Client {} sent an over-long command", client_addr);
                if write_half.write_all(COMMAND_TOO_LONG.as_bytes()).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(LineRead::Eof) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        log_command(&peer, &line);

        let result = match parse_command(&line) {
            Command::WRITE(len, _) if len > config.max_content_bytes => {
                warn!(
                    "Client {} tried to write {} bytes (limit {})",
                    client_addr, len, config.max_content_bytes
                );
                // The payload cannot be skipped safely, so the connection ends here
                let reply = format_response(
                    BAD_ARGUMENTS,
                    &format!(
                        "InvalidInput: content exceeds {} bytes",
                        config.max_content_bytes
                    ),
                );
                let _ = write_half.write_all(reply.as_bytes()).await;
                break;
            }
            Command::WRITE(len, _) if !client.has_session() => {
                warn!(
                    "Client {} sent a {} byte WRITE without a session",
                    client_addr, len
                );
                // Refuse before buffering anything; the payload is left unread
                let reply = error_reply(&ServiceError::Unauthenticated);
                let _ = write_half.write_all(reply.as_bytes()).await;
                break;
            }
            Command::WRITE(len, path) => {
                let mut payload = vec![0u8; len];
                if let Err(e) = reader.read_exact(&mut payload).await {
                    error!("Failed to read WRITE payload from {}: {}", client_addr, e);
                    break;
                }
                handle_write(&client, &service, &path, payload).await
            }
            command => handle_command(&mut client, &command, &service).await,
        };

        if let Some(msg) = &result.message {
            if let Err(e) = write_half.write_all(msg.as_bytes()).await {
                error!("Failed to reply to {}: {}", client_addr, e);
                break;
            }
        }

        if result.status == CommandStatus::CloseConnection {
            info!("Client {} requested to quit", client_addr);
            break;
        }
    }

    let _ = write_half.shutdown().await;
    info!("Client {} disconnected", client_addr);
}

/// Read one line of at most `max` bytes (terminator included).
///
/// An over-long line is consumed up to and including its newline so the
/// next read starts on a fresh command.
async fn read_command_line<R>(reader: &mut R, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader).take(max as u64 + 1).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.len() > max {
        if buf.last() != Some(&b'\n') {
            discard_line(reader).await?;
        }
        return Ok(LineRead::TooLong);
    }

    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}

async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}
