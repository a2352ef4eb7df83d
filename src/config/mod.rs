//! Configuration management for the ioBroker MCP server
//!
//! Configuration is layered: built-in defaults, an optional TOML file, the
//! `IOBROKER_*` environment variables, and finally command line flags applied
//! by the binary.

use crate::error::{IoBrokerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, time::Duration};
use url::Url;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// ioBroker REST API connection
    pub iobroker: IoBrokerConfig,

    /// Adapter start/stop/restart sequencing
    pub lifecycle: LifecycleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Connection settings for the ioBroker REST API adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoBrokerConfig {
    /// Host name or IP of the ioBroker instance
    pub host: String,

    /// Port of the REST API adapter
    pub port: u16,

    /// Transport scheme (http or https)
    pub protocol: String,

    /// Optional basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Optional basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Enable SSL/TLS verification
    pub verify_ssl: bool,
}

/// Settings for adapter lifecycle actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Pause between the disable and enable writes of a restart
    #[serde(with = "humantime_serde")]
    pub settle_interval: Duration,

    /// Poll the adapter's `alive` state before re-enabling it
    pub confirm_stop: bool,

    /// Maximum number of `alive` polls
    pub confirm_attempts: u32,

    /// Pause between two `alive` polls
    #[serde(with = "humantime_serde")]
    pub confirm_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable structured JSON logging
    pub json_format: bool,

    /// Log to file (path)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for IoBrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8087,
            protocol: "http".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            verify_ssl: true,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_millis(300),
            confirm_stop: false,
            confirm_attempts: 5,
            confirm_interval: Duration::from_millis(200),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file: None,
        }
    }
}

impl IoBrokerConfig {
    /// Base URL of the REST API, e.g. `http://localhost:8087/`
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&format!("{}://{}:{}/", self.protocol, self.host, self.port))?;
        Ok(url)
    }

    /// Basic auth credentials, only when both halves are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl ServerConfig {
    /// Load defaults, merge an optional TOML file, then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(IoBrokerError::config(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `IOBROKER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("IOBROKER_HOST") {
            self.iobroker.host = host;
        }

        if let Ok(port) = env::var("IOBROKER_PORT") {
            self.iobroker.port = port
                .parse()
                .map_err(|e| IoBrokerError::config(format!("Invalid IOBROKER_PORT: {e}")))?;
        }

        if let Ok(protocol) = env::var("IOBROKER_PROTOCOL") {
            self.iobroker.protocol = protocol.to_lowercase();
        }

        if let Ok(user) = env::var("IOBROKER_USER") {
            self.iobroker.username = Some(user);
        }

        if let Ok(password) = env::var("IOBROKER_PASSWORD") {
            self.iobroker.password = Some(password);
        }

        if let Ok(timeout) = env::var("IOBROKER_TIMEOUT") {
            self.iobroker.timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| IoBrokerError::config(format!("Invalid IOBROKER_TIMEOUT: {e}")))?;
        }

        if let Ok(settle) = env::var("IOBROKER_RESTART_SETTLE") {
            self.lifecycle.settle_interval = humantime_serde::re::humantime::parse_duration(&settle).map_err(|e| {
                IoBrokerError::config(format!("Invalid IOBROKER_RESTART_SETTLE: {e}"))
            })?;
        }

        if let Ok(file) = env::var("IOBROKER_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }

        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.iobroker.host.trim().is_empty() {
            return Err(IoBrokerError::config("ioBroker host cannot be empty"));
        }

        if self.iobroker.protocol != "http" && self.iobroker.protocol != "https" {
            return Err(IoBrokerError::config(format!(
                "Unsupported protocol '{}'. Use http or https",
                self.iobroker.protocol
            )));
        }

        if self.iobroker.timeout.is_zero() {
            return Err(IoBrokerError::config("Timeout must be greater than zero"));
        }

        if self.iobroker.username.is_some() != self.iobroker.password.is_some() {
            return Err(IoBrokerError::config(
                "IOBROKER_USER and IOBROKER_PASSWORD must be set together",
            ));
        }

        if self.lifecycle.confirm_stop && self.lifecycle.confirm_attempts == 0 {
            return Err(IoBrokerError::config(
                "confirm_attempts must be at least 1 when confirm_stop is enabled",
            ));
        }

        self.iobroker.base_url()?;
        Ok(())
    }
}
