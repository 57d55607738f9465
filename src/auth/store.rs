//! SQLite-backed credential store.
//!
//! Table:
//! - `users`: id, username (unique), email, password_hash

use log::{info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::auth::password::{dummy_verify, hash_password, needs_rehash, verify_password};
use crate::auth::validator::{validate_email, validate_secret, validate_username};
use crate::error::AuthError;
use crate::storage::commit::CommitGate;

/// Numeric user identity assigned by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// SQLite-backed credential store.
pub struct CredentialStore {
    conn: Mutex<rusqlite::Connection>,
    password_iterations: u32,
    busy_timeout: Duration,
}

impl CredentialStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(
        db_path: &Path,
        password_iterations: u32,
        busy_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let conn = rusqlite::Connection::open(db_path)?;
        conn.busy_timeout(busy_timeout)?;

        // FULL sync: a registration is on disk before register() returns
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL
            );",
        )?;

        info!("Credential store opened at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            password_iterations,
            busy_timeout,
        })
    }

    /// Register a new user. Returns the assigned user ID.
    pub fn register(&self, username: &str, email: &str, secret: &str) -> Result<UserId, AuthError> {
        self.register_gated(username, email, secret, &CommitGate::new())
    }

    /// Register a new user, inserting only if `gate` still allows it.
    pub fn register_gated(
        &self,
        username: &str,
        email: &str,
        secret: &str,
        gate: &CommitGate,
    ) -> Result<UserId, AuthError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_secret(secret)?;

        // Hash outside the connection lock; it is the slow part.
        let password_hash = hash_password(secret, self.password_iterations);

        let conn = self.conn.lock();
        if !gate.try_commit() {
            return Err(AuthError::Busy(format!(
                "registration of {} abandoned",
                username
            )));
        }
        let result = conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, email, password_hash],
        );

        match result {
            Ok(_) => {
                let id = UserId(conn.last_insert_rowid());
                info!("User {} registered with id {}", username, id);
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                warn!("Registration failed for user {}: duplicate username", username);
                Err(AuthError::DuplicateIdentity(username.to_string()))
            }
            Err(e) => Err(self.classify(e)),
        }
    }

    /// Authenticate a user by username + secret.
    pub fn authenticate(&self, username: &str, secret: &str) -> Result<UserId, AuthError> {
        let row: Result<(i64, String), _> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                rusqlite::params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        };

        match row {
            Ok((id, stored_hash)) => {
                if !verify_password(secret, &stored_hash, self.password_iterations) {
                    return Err(AuthError::InvalidCredentials);
                }
                if needs_rehash(&stored_hash, self.password_iterations) {
                    self.rehash(id, username, secret);
                }
                Ok(UserId(id))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // Same cost as a real check so timing does not reveal unknown users
                dummy_verify(secret, self.password_iterations);
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => Err(self.classify(e)),
        }
    }

    /// Re-hash with the configured round count after a successful login.
    ///
    /// Failure only leaves the old hash in place, so it is logged and ignored.
    fn rehash(&self, id: i64, username: &str, secret: &str) {
        let password_hash = hash_password(secret, self.password_iterations);
        let conn = self.conn.lock();
        match conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            rusqlite::params![password_hash, id],
        ) {
            Ok(_) => info!(
                "Password hash for user {} upgraded to {} rounds",
                username, self.password_iterations
            ),
            Err(e) => warn!("Could not re-hash password for user {}: {}", username, e),
        }
    }

    /// Look up a user by ID.
    pub fn get_user(&self, id: UserId) -> Result<Option<User>, AuthError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, email FROM users WHERE id = ?1",
            rusqlite::params![id.0],
            |row| {
                Ok(User {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            },
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.classify(e)),
        }
    }

    /// Count registered users.
    pub fn user_count(&self) -> Result<u64, AuthError> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| self.classify(e))?;
        Ok(count as u64)
    }

    /// Busy/locked database errors are surfaced as transient.
    fn classify(&self, err: rusqlite::Error) -> AuthError {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                AuthError::Busy(format!(
                    "database locked for more than {} ms",
                    self.busy_timeout.as_millis()
                ))
            }
            _ => AuthError::Database(err),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
