//! satellite-hub - Multi-cluster resource hub
//!
//! A hub that answers Kubernetes resource queries by fanning them out to the
//! satellites owning the selected clusters, and reverse proxies all other
//! traffic to a single satellite.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration file and environment overrides
//! - [`hub`] - Fan-out, proxy, satellite registry and HTTP server
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use satellite_hub::config::Config;
//! use satellite_hub::hub::HubServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref())?;
//!     let server = HubServer::from_config(&config)?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod hub;
pub mod metrics;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::hub::{
        FanoutAggregator, HubError, HubServer, HubServerConfig, ResourceQuery, ResourceResponse,
        Satellite, SatelliteRegistry, TargetId, User,
    };
}
