//! Hub server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::Config;

/// Configuration for the hub server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for API
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Timeout for one satellite list call in seconds
    pub leaf_timeout_secs: u64,

    /// Header the authenticating proxy puts the user's email in
    pub user_header: String,

    /// Header the authenticating proxy puts the user's teams in
    pub teams_header: String,
}

impl Default for HubServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 15220)),
            enable_cors: true,
            enable_request_logging: true,
            leaf_timeout_secs: 60,
            user_header: "x-forwarded-email".to_string(),
            teams_header: "x-forwarded-groups".to_string(),
        }
    }
}

impl HubServerConfig {
    /// Create a new config builder
    pub fn builder() -> HubServerConfigBuilder {
        HubServerConfigBuilder::default()
    }

    /// Take the server settings from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let server_config = Self {
            bind_address: config.server.bind_address,
            enable_cors: config.server.enable_cors,
            enable_request_logging: config.server.enable_request_logging,
            leaf_timeout_secs: config.server.leaf_timeout_secs,
            user_header: config.auth.user_header.clone(),
            teams_header: config.auth.teams_header.clone(),
        };

        server_config.validate()?;
        Ok(server_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leaf_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "leaf_timeout_secs".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        if self.user_header.is_empty() {
            return Err(ConfigError::MissingField {
                field: "user_header".to_string(),
            });
        }

        Ok(())
    }

    pub fn leaf_timeout(&self) -> Duration {
        Duration::from_secs(self.leaf_timeout_secs)
    }
}

/// Builder for HubServerConfig
#[derive(Debug, Default)]
pub struct HubServerConfigBuilder {
    bind_address: Option<SocketAddr>,
    enable_cors: Option<bool>,
    enable_request_logging: Option<bool>,
    leaf_timeout_secs: Option<u64>,
    user_header: Option<String>,
    teams_header: Option<String>,
}

impl HubServerConfigBuilder {
    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address".to_string(),
            reason: format!("Invalid address: {}", addr),
        })?);
        Ok(self)
    }

    /// Enable/disable CORS
    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Set the per-leaf timeout
    pub fn leaf_timeout_secs(mut self, secs: u64) -> Self {
        self.leaf_timeout_secs = Some(secs);
        self
    }

    /// Set the identity header names
    pub fn identity_headers(mut self, user: impl Into<String>, teams: impl Into<String>) -> Self {
        self.user_header = Some(user.into());
        self.teams_header = Some(teams.into());
        self
    }

    /// Build the config
    pub fn build(self) -> Result<HubServerConfig, ConfigError> {
        let defaults = HubServerConfig::default();
        let config = HubServerConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            enable_cors: self.enable_cors.unwrap_or(defaults.enable_cors),
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
            leaf_timeout_secs: self.leaf_timeout_secs.unwrap_or(defaults.leaf_timeout_secs),
            user_header: self.user_header.unwrap_or(defaults.user_header),
            teams_header: self.teams_header.unwrap_or(defaults.teams_header),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}
