//! Session registry
//!
//! Tokens are 32 random bytes, hex-encoded for the client. The registry only
//! keeps the SHA-256 digest of each token, so a memory dump does not yield
//! usable tokens. Lookups never touch disk.

use log::{debug, info};
use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::auth::UserId;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Opaque bearer token handed to the client after login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        SessionToken(hex::encode(bytes))
    }
}

// Tokens are credentials; keep them out of debug logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(****)")
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        SessionToken(token)
    }
}

/// Proof of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub expires_at: Instant,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a session for an authenticated user.
    /// Returns the plaintext token (only revealed once).
    pub fn create(&self, user_id: UserId, username: &str) -> SessionToken {
        let token = SessionToken::generate();
        let session = Session {
            user_id,
            username: username.to_string(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().insert(hash_token(token.as_str()), session);
        info!("Session opened for user {}", username);
        token
    }

    /// Returns the live session for `token`, or `None` if unknown or expired.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let key = hash_token(token);
        let now = Instant::now();

        {
            let sessions = self.sessions.read();
            match sessions.get(&key) {
                Some(session) if session.expires_at > now => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so it cannot be revived
        if let Some(session) = self.sessions.write().remove(&key) {
            debug!("Session for user {} expired", session.username);
        }
        None
    }

    /// Revoke a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        match self.sessions.write().remove(&hash_token(token)) {
            Some(session) => {
                info!("Session closed for user {}", session.username);
                true
            }
            None => false,
        }
    }

    /// Remove expired sessions. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash a session token (SHA-256, single pass; tokens are already high-entropy).
fn hash_token(token: &str) -> String {
    let mut h = Sha256::new();
    h.update(token.as_bytes());
    hex::encode(h.finalize())
}
