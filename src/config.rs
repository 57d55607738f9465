//! Configuration management for the Vellum workspace server
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `VELLUM` (e.g. `VELLUM__PORT=3000`).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, resolved relative to the working directory
const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    // ═══ NETWORK ═══
    /// IP address the line-protocol listener binds to
    pub bind_address: String,

    /// Listener port (0 picks a free port)
    pub port: u16,

    /// Maximum concurrent client connections
    pub max_clients: usize,

    // ═══ STORAGE ═══
    /// Root directory of the shared workspace
    pub workspace_root: String,

    /// SQLite database holding the users table
    pub database_path: String,

    /// Upper bound on any single storage call
    pub storage_timeout_ms: u64,

    // ═══ AUTHENTICATION ═══
    /// Session lifetime after login
    pub session_ttl_secs: u64,

    /// How often expired sessions are swept from memory
    pub session_sweep_secs: u64,

    /// PBKDF2 rounds for new password hashes
    pub password_iterations: u32,

    /// Failed logins tolerated per username inside the window (0 disables)
    pub max_failed_logins: usize,

    pub failed_login_window_secs: u64,

    // ═══ PROTOCOL LIMITS ═══
    pub max_command_length: usize,

    /// Largest file body accepted by WRITE
    pub max_content_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 2626,
            max_clients: 64,
            workspace_root: "./user-files".to_string(),
            database_path: "./users.db".to_string(),
            storage_timeout_ms: 5_000,
            session_ttl_secs: 24 * 60 * 60,
            session_sweep_secs: 60,
            password_iterations: 100_000,
            max_failed_logins: 5,
            failed_login_window_secs: 300,
            max_command_length: 4096,
            max_content_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), false)
    }

    /// Load configuration from an explicit file path with environment overrides
    ///
    /// When `required` is false a missing file falls back to defaults.
    pub fn load_from(path: &Path, required: bool) -> Result<Self, config::ConfigError> {
        let defaults = ServerConfig::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("workspace_root", defaults.workspace_root)?
            .set_default("database_path", defaults.database_path)?
            .set_default("storage_timeout_ms", defaults.storage_timeout_ms as i64)?
            .set_default("session_ttl_secs", defaults.session_ttl_secs as i64)?
            .set_default("session_sweep_secs", defaults.session_sweep_secs as i64)?
            .set_default("password_iterations", i64::from(defaults.password_iterations))?
            .set_default("max_failed_logins", defaults.max_failed_logins as i64)?
            .set_default(
                "failed_login_window_secs",
                defaults.failed_login_window_secs as i64,
            )?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("max_content_bytes", defaults.max_content_bytes as i64)?
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("VELLUM")
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.workspace_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "workspace_root cannot be empty".into(),
            ));
        }

        if self.database_path.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "database_path cannot be empty".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.storage_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "storage_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.session_ttl_secs == 0 || self.session_sweep_secs == 0 {
            return Err(config::ConfigError::Message(
                "session_ttl_secs and session_sweep_secs must be greater than 0".into(),
            ));
        }

        if self.password_iterations == 0 {
            return Err(config::ConfigError::Message(
                "password_iterations must be greater than 0".into(),
            ));
        }

        if self.max_failed_logins > 0 && self.failed_login_window_secs == 0 {
            return Err(config::ConfigError::Message(
                "failed_login_window_secs must be greater than 0 when throttling is enabled"
                    .into(),
            ));
        }

        if self.max_command_length < 64 {
            return Err(config::ConfigError::Message(
                "max_command_length must be at least 64".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn workspace_root_path(&self) -> PathBuf {
        PathBuf::from(&self.workspace_root)
    }

    pub fn database_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs)
    }

    pub fn failed_login_window(&self) -> Duration {
        Duration::from_secs(self.failed_login_window_secs)
    }
}
