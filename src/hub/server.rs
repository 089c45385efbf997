//! Hub server implementation
//!
//! This module provides the main server that wires the registry, the
//! fan-out aggregator and the proxy into one HTTP router.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

use super::api::create_router;
use super::catalog::{MemoryResourceStore, ResourceCatalog};
use super::config::{ConfigError, HubServerConfig};
use super::fanout::FanoutAggregator;
use super::identity::{HeaderIdentityProvider, IdentityProvider};
use super::proxy::ProxyForwarder;
use super::registry::SatelliteRegistry;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Satellite registry
    pub registry: SatelliteRegistry,

    /// Resource fan-out
    pub aggregator: FanoutAggregator,

    /// Satellite proxy
    pub proxy: ProxyForwarder,

    /// Source of the authenticated user
    pub identity: Arc<dyn IdentityProvider>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: HubServerConfig,
}

// ============================================================================
// Hub Server
// ============================================================================

/// Main hub server
pub struct HubServer {
    config: HubServerConfig,
    state: AppState,
}

impl HubServer {
    /// Create a new hub server
    pub fn new(
        config: HubServerConfig,
        registry: SatelliteRegistry,
        catalog: ResourceCatalog,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let identity = HeaderIdentityProvider::new(&config.user_header, &config.teams_header)
            .map_err(|e| ServerError::Init(e.to_string()))?;

        let aggregator =
            FanoutAggregator::new(registry.clone(), catalog)
                .with_leaf_timeout(config.leaf_timeout());

        let state = AppState {
            proxy: ProxyForwarder::new(registry.clone()),
            registry,
            aggregator,
            identity: Arc::new(identity),
            start_time: Instant::now(),
            config: config.clone(),
        };

        Ok(Self { config, state })
    }

    /// Create a server that only knows the built-in resources
    pub fn with_registry(
        config: HubServerConfig,
        registry: SatelliteRegistry,
    ) -> Result<Self, ServerError> {
        Self::new(config, registry, ResourceCatalog::default())
    }

    /// Create a server from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let server_config = HubServerConfig::from_config(config)?;

        let registry = SatelliteRegistry::from_config(&config.satellites)
            .map_err(|e| ServerError::Init(e.to_string()))?;

        let store = MemoryResourceStore::new(config.resources.iter().cloned());
        let catalog = ResourceCatalog::with_store(Arc::new(store));

        Self::new(server_config, registry, catalog)
    }

    /// Replace the identity provider
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.state.identity = identity;
        self
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        // Add CORS layer if enabled
        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        // Add tracing layer if enabled
        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        tracing::info!(
            satellites = self.state.registry.snapshot().len(),
            "Starting hub server on {}",
            addr
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Hub server shutdown complete");
        Ok(())
    }

    /// Reload the satellites from `path` whenever the process receives SIGHUP.
    ///
    /// A configuration that fails to load or validate is logged and the
    /// current generation stays in place.
    #[cfg(unix)]
    pub fn reload_on_sighup(&self, path: PathBuf) -> Result<(), ServerError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup =
            signal(SignalKind::hangup()).map_err(|e| ServerError::Init(e.to_string()))?;
        let registry = self.state.registry.clone();

        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                tracing::info!(path = %path.display(), "Received SIGHUP, reloading satellites");
                if let Err(e) = reload_satellites(&registry, &path) {
                    tracing::error!(
                        error = %e,
                        "Satellite reload failed, keeping current generation"
                    );
                }
            }
        });

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn reload_on_sighup(&self, _path: PathBuf) -> Result<(), ServerError> {
        tracing::warn!("Configuration reload on SIGHUP is not supported on this platform");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            leaf_timeout_secs: self.config.leaf_timeout_secs,
            satellites: self.state.registry.names(),
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }
}

/// Load the configuration file and swap in a new satellite generation
pub fn reload_satellites(
    registry: &SatelliteRegistry,
    path: &std::path::Path,
) -> anyhow::Result<u64> {
    let config = Config::load(path)?;
    Ok(registry.reload_from_config(&config.satellites)?)
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub leaf_timeout_secs: u64,
    pub satellites: Vec<String>,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Satellite Hub\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Leaf Timeout: {}s\n\
             Satellites: {}\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.leaf_timeout_secs,
            if self.satellites.is_empty() {
                "none".to_string()
            } else {
                self.satellites.join(", ")
            },
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(thiserror::Error, Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),

    /// Failed to bind to address
    #[error("Failed to bind: {0}")]
    Bind(String),

    /// Server error
    #[error("Server error: {0}")]
    Serve(String),
}

// ============================================================================
// Tests
// ============================================================================
