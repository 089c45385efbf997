//! Hub server for multi-cluster resource access
//!
//! The hub is the single entry point for clients. It answers resource queries
//! by fanning them out to the satellites that own the selected clusters, and
//! reverse proxies everything else to exactly one satellite.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Hub Server                 │
//! │                                          │
//! │  ┌────────────────────────────────────┐  │
//! │  │  Identity layer (x-kobs-user)      │  │
//! │  └────────────────────────────────────┘  │
//! │                                          │
//! │  ┌───────────────┐   ┌────────────────┐  │
//! │  │ Fan-out       │   │ Proxy          │  │
//! │  │ - catalog     │   │ - one satellite│  │
//! │  │ - target ids  │   │ - HTTP stream  │  │
//! │  │ - per leaf    │   │ - WebSocket    │  │
//! │  │   timeout     │   │   relay        │  │
//! │  └───────┬───────┘   └───────┬────────┘  │
//! │          └─────────┬─────────┘           │
//! │  ┌─────────────────┴──────────────────┐  │
//! │  │  Satellite registry (generations)  │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//!           │            │            │
//!       satellite    satellite    satellite
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use satellite_hub::config::Config;
//! use satellite_hub::hub::HubServer;
//!
//! let config = Config::load("config.toml".as_ref())?;
//! let server = HubServer::from_config(&config)?;
//! server.start().await?;
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fanout;
pub mod identifier;
pub mod identity;
pub mod proxy;
pub mod registry;
pub mod satellite;
pub mod server;
pub mod transport;

// Re-export main types
pub use catalog::{Resource, ResourceCatalog, ResourceStore, Scope};
pub use config::HubServerConfig;
pub use error::{HubError, HubResult};
pub use fanout::{FanoutAggregator, ResourceList, ResourceQuery, ResourceResponse};
pub use identifier::TargetId;
pub use identity::{IdentityProvider, User};
pub use registry::SatelliteRegistry;
pub use satellite::{HttpSatellite, Satellite, SatelliteError};
pub use server::{HubServer, ServerError};
