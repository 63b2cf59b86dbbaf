//! Server configuration.
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. A TOML file (`--config <path>`, else `<config dir>/huddle/huddled.toml` if present)
//! 3. The `HUDDLE_ADDR` environment variable
//! 4. The `--listen` command line flag
//!
//! The binary applies layers 3 and 4 through [`ServerConfig::override_listen_addr`].
//!
//! # Example file
//!
//! ```toml
//! listen_addr = "0.0.0.0:8080"
//! max_sessions = 500
//! write_timeout_ms = 5000
//! max_line_length = 4096
//! shutdown_grace_ms = 500
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use huddle_protocol::DEFAULT_MAX_LINE_LENGTH;

/// Default address the server listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Environment variable that overrides the listen address.
pub const LISTEN_ADDR_ENV: &str = "HUDDLE_ADDR";

/// Default time to wait for session tasks after closing them on shutdown.
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,

    /// Maximum number of concurrent sessions (`None` = unlimited).
    pub max_sessions: Option<usize>,

    /// Per-write timeout in milliseconds (`None` = writes may block forever).
    ///
    /// Without a timeout, a peer that stops draining its socket stalls
    /// whichever session is currently broadcasting to it.
    pub write_timeout_ms: Option<u64>,

    /// Longest accepted inbound line in bytes, terminator included.
    pub max_line_length: usize,

    /// How long shutdown waits for session tasks after closing them.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_sessions: None,
            write_timeout_ms: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl ServerConfig {
    /// Path of the per-user config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("huddle").join("huddled.toml"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Resolves the file layer.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading default config file");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Replaces the listen address with `addr` when one is given.
    ///
    /// A blank value counts as not given.
    pub fn override_listen_addr(&mut self, addr: Option<&str>) -> Result<(), ConfigError> {
        if let Some(addr) = addr.map(str::trim).filter(|a| !a.is_empty()) {
            self.listen_addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(addr.to_string()))?;
        }
        Ok(())
    }

    /// Per-write timeout, if configured.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "max_line_length must be greater than zero".to_string(),
            ));
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::Invalid(
                "max_sessions must be greater than zero".to_string(),
            ));
        }
        if self.write_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "write_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
