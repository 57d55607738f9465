//! Module `state`
//!
//! Per-connection state: the peer address and the session token the
//! connection is currently acting under.

use std::net::SocketAddr;

use crate::session::SessionToken;

/// State of one connected client.
///
/// The session itself lives in the service registry; the connection only
/// remembers which token to present.
pub struct Client {
    client_addr: SocketAddr,
    token: Option<SessionToken>,
    username: Option<String>,
}

impl Client {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            token: None,
            username: None,
        }
    }

    /// Forget the current session on this connection.
    pub fn logout(&mut self) -> Option<SessionToken> {
        self.username = None;
        self.token.take()
    }

    /// Adopt a session, returning the one it replaces (if any).
    pub fn set_session(&mut self, token: SessionToken, username: String) -> Option<SessionToken> {
        self.username = Some(username);
        self.token.replace(token)
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// Token to present to the service; empty when no session is held.
    pub fn token(&self) -> &str {
        self.token.as_ref().map(SessionToken::as_str).unwrap_or("")
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn has_session(&self) -> bool {
        self.token.is_some()
    }
}
