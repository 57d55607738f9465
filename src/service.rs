//! Workspace service
//!
//! The single entry point the protocol layer talks to. Owns the credential
//! store, the session registry, the login throttle and the workspace, and is
//! shared between connections behind an `Arc`. Every workspace operation
//! starts by checking the caller's session.

use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialStore, UserId};
use crate::config::ServerConfig;
use crate::error::{AuthError, ErrorKind, ServiceError};
use crate::middleware::LoginThrottle;
use crate::session::{Session, SessionRegistry, SessionToken};
use crate::storage::commit::{CommitGate, GateError, run_gated};
use crate::storage::{Workspace, WorkspaceEntry};

pub struct WorkspaceService {
    credentials: Arc<CredentialStore>,
    sessions: SessionRegistry,
    throttle: LoginThrottle,
    workspace: Workspace,
    storage_timeout: Duration,
}

impl WorkspaceService {
    pub fn new(
        credentials: CredentialStore,
        workspace: Workspace,
        sessions: SessionRegistry,
        throttle: LoginThrottle,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            sessions,
            throttle,
            workspace,
            storage_timeout,
        }
    }

    /// Open the credential store and workspace named by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServiceError> {
        let credentials = CredentialStore::open(
            &config.database_path_buf(),
            config.password_iterations,
            config.storage_timeout(),
        )?;
        let workspace = Workspace::open(&config.workspace_root_path(), config.storage_timeout())?;

        Ok(Self::new(
            credentials,
            workspace,
            SessionRegistry::new(config.session_ttl()),
            LoginThrottle::new(config.max_failed_logins, config.failed_login_window()),
            config.storage_timeout(),
        ))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    // ── Identity ────────────────────────────────────────────────────

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        secret: &str,
    ) -> Result<UserId, ServiceError> {
        let (user, mail, pass) = (username.to_string(), email.to_string(), secret.to_string());
        let id = self
            .with_credentials(move |store, gate| store.register_gated(&user, &mail, &pass, gate))
            .await?;
        Ok(id)
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, username: &str, secret: &str) -> Result<SessionToken, ServiceError> {
        if !self.throttle.try_begin(username) {
            warn!("Login for user {} refused: too many failed attempts", username);
            return Err(AuthError::InvalidCredentials.into());
        }

        let (user, pass) = (username.to_string(), secret.to_string());
        let outcome = self
            .with_credentials(move |store, _gate| store.authenticate(&user, &pass))
            .await;

        match outcome {
            Ok(user_id) => {
                self.throttle.clear(username);
                info!("User {} logged in", username);
                Ok(self.sessions.create(user_id, username))
            }
            Err(e) => {
                if e.kind() == ErrorKind::InvalidCredentials {
                    // The reserved attempt stays on record as the failure
                    warn!("Failed login attempt for user {}", username);
                } else {
                    self.throttle.release(username);
                }
                Err(e.into())
            }
        }
    }

    /// End a session. Unknown or expired tokens are not an error.
    pub fn logout(&self, token: &str) {
        self.sessions.revoke(token);
    }

    /// The live session behind `token`.
    pub fn session(&self, token: &str) -> Result<Session, ServiceError> {
        self.sessions
            .validate(token)
            .ok_or(ServiceError::Unauthenticated)
    }

    /// Drop expired sessions and stale throttle entries.
    pub fn sweep(&self) -> usize {
        self.throttle.purge_stale();
        self.sessions.purge_expired()
    }

    // ── Workspace ───────────────────────────────────────────────────

    pub async fn list_entries(&self, token: &str) -> Result<Vec<WorkspaceEntry>, ServiceError> {
        self.session(token)?;
        Ok(self.workspace.list().await?)
    }

    /// Returns the normalised path of the new folder.
    pub async fn create_folder(&self, token: &str, path: &str) -> Result<String, ServiceError> {
        let session = self.session(token)?;
        let created = self.workspace.create_folder(path).await?;
        info!("User {} created folder \"{}\"", session.username, created);
        Ok(created)
    }

    pub async fn read_file(&self, token: &str, path: &str) -> Result<String, ServiceError> {
        self.session(token)?;
        Ok(self.workspace.read_file(path).await?)
    }

    /// Returns the normalised path of the written file.
    pub async fn write_file(
        &self,
        token: &str,
        path: &str,
        content: String,
    ) -> Result<String, ServiceError> {
        let session = self.session(token)?;
        let written = self.workspace.write_file(path, content).await?;
        info!("User {} wrote file \"{}\"", session.username, written);
        Ok(written)
    }

    /// Returns the normalised path of the deleted entry.
    pub async fn delete_entry(&self, token: &str, path: &str) -> Result<String, ServiceError> {
        let session = self.session(token)?;
        let deleted = self.workspace.delete(path).await?;
        info!("User {} deleted \"{}\"", session.username, deleted);
        Ok(deleted)
    }

    /// Run a credential store call on the blocking pool under the storage timeout.
    async fn with_credentials<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialStore, &CommitGate) -> Result<T, AuthError> + Send + 'static,
    {
        let store = Arc::clone(&self.credentials);
        let timeout_ms = self.storage_timeout.as_millis() as u64;

        match run_gated(self.storage_timeout, move |gate| op(&store, gate)).await {
            Ok(result) => result,
            Err(GateError::TimedOut) => {
                warn!("Credential store call timed out after {} ms", timeout_ms);
                Err(AuthError::Timeout(timeout_ms))
            }
            Err(GateError::Failed(e)) => Err(AuthError::Busy(format!("credential task failed: {}", e))),
        }
    }
}
