//! Configuration management with TOML support
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `VMSWEEP_*` environment variables. The binary applies command line flags
//! on top and calls [`Config::validate`] last.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SweepError, SweepResult};

/// Default HTTPS port of an inventory endpoint
pub const DEFAULT_PORT: u16 = 443;

/// Complete configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub inventory: InventoryConfig,
    pub logging: LoggingConfig,
}

/// Where and how to open an inventory session
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host name or IP address of the inventory endpoint
    pub address: String,

    pub port: u16,

    pub user: String,

    pub password: String,

    /// Registered backend type to connect through
    pub backend: String,
}

/// Inventory source for file-backed backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// YAML inventory description
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl ConnectionConfig {
    /// `address:port`, used in log lines and connection errors
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            backend: "simulated".to_string(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            SweepError::configuration(
                "config file",
                format!("Failed to read {}: {}", path.as_ref().display(), e),
            )
        })?;

        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("VMSWEEP_ADDRESS") {
            self.connection.address = address;
        }
        if let Ok(port) = std::env::var("VMSWEEP_PORT") {
            if let Ok(port) = port.parse() {
                self.connection.port = port;
            }
        }
        if let Ok(user) = std::env::var("VMSWEEP_USER") {
            self.connection.user = user;
        }
        if let Ok(password) = std::env::var("VMSWEEP_PASSWORD") {
            self.connection.password = password;
        }
        if let Ok(backend) = std::env::var("VMSWEEP_BACKEND") {
            self.connection.backend = backend;
        }
        if let Ok(path) = std::env::var("VMSWEEP_INVENTORY") {
            self.inventory.path = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var("VMSWEEP_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SweepResult<()> {
        if self.connection.address.trim().is_empty() {
            return Err(SweepError::configuration(
                "connection.address",
                "an inventory address is required",
            ));
        }

        if self.connection.port == 0 {
            return Err(SweepError::configuration(
                "connection.port",
                "port must be non-zero",
            ));
        }

        if self.connection.user.is_empty() {
            return Err(SweepError::configuration(
                "connection.user",
                "a user name is required",
            ));
        }

        if self.connection.backend.is_empty() {
            return Err(SweepError::configuration(
                "connection.backend",
                "backend type cannot be empty",
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(SweepError::configuration(
                    "logging.level",
                    format!("Invalid log level: {}", other),
                ))
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(SweepError::configuration(
                    "logging.format",
                    format!("Invalid log format: {}", other),
                ))
            }
        }

        Ok(())
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already loaded configuration
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.connection.address = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.connection.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.connection.password = password.into();
        self
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.config.connection.backend = backend.into();
        self
    }

    pub fn inventory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.inventory.path = Some(path.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn build(self) -> SweepResult<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
