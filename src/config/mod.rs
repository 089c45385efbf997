//! Configuration management for the hub
//!
//! Configuration is read from a TOML file and can be partially overridden by
//! environment variables.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:15220"
//!
//! [[satellites]]
//! name = "dev"
//! address = "http://satellite.dev.svc:15221"
//! token = "unsafe"
//!
//! [[resources]]
//! id = "vaultsecrets.ricoberger.de/v1alpha1"
//! path = "/apis/ricoberger.de/v1alpha1"
//! resource = "vaultsecrets"
//! scope = "Namespaced"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::hub::catalog::CustomResourceRecord;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Satellites the hub forwards to
    #[serde(default)]
    pub satellites: Vec<SatelliteConfig>,

    /// Custom resources known in addition to the built-in ones
    #[serde(default)]
    pub resources: Vec<CustomResourceRecord>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for the API
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Timeout for a single satellite list call in seconds
    pub leaf_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 15220)),
            enable_cors: true,
            enable_request_logging: true,
            leaf_timeout_secs: 60,
        }
    }
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the authenticated user's email
    pub user_header: String,

    /// Header carrying the user's teams, comma separated
    pub teams_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: String::from("x-forwarded-email"),
            teams_header: String::from("x-forwarded-groups"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// A satellite the hub can reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteConfig {
    /// Unique satellite name, first segment of target ids
    pub name: String,

    /// Base address of the satellite API
    pub address: String,

    /// Bearer token sent to the satellite
    #[serde(default)]
    pub token: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from a file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `HUB_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Some(addr) = std::env::var("HUB_BIND_ADDRESS")
            .ok()
            .and_then(|v| v.parse::<SocketAddr>().ok())
        {
            self.server.bind_address = addr;
        }

        if let Ok(level) = std::env::var("HUB_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("HUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.leaf_timeout_secs == 0 {
            anyhow::bail!("leaf_timeout_secs must be greater than 0");
        }

        let mut names = HashSet::new();
        for satellite in &self.satellites {
            if satellite.name.is_empty() || satellite.name.contains('/') {
                anyhow::bail!("invalid satellite name: {:?}", satellite.name);
            }
            if !names.insert(satellite.name.as_str()) {
                anyhow::bail!("duplicate satellite name: {}", satellite.name);
            }
            let address = url::Url::parse(&satellite.address).with_context(|| {
                format!("invalid address for satellite {}: {}", satellite.name, satellite.address)
            })?;
            // Request paths are joined as absolute paths and replace any base path
            if address.path() != "/" {
                anyhow::bail!(
                    "address of satellite {} must not contain a path: {}",
                    satellite.name,
                    satellite.address
                );
            }
            if satellite.connect_timeout_secs == 0 {
                anyhow::bail!(
                    "connect_timeout_secs of satellite {} must be greater than 0",
                    satellite.name
                );
            }
        }

        let mut ids = HashSet::new();
        for resource in &self.resources {
            if !ids.insert(resource.id.as_str()) {
                anyhow::bail!("duplicate resource id: {}", resource.id);
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be text or json, got {}", self.logging.format);
        }

        Ok(())
    }

    /// Get the per-leaf timeout as Duration
    #[must_use]
    pub fn leaf_timeout(&self) -> Duration {
        Duration::from_secs(self.server.leaf_timeout_secs)
    }
}
