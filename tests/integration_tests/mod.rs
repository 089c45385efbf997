//! Integration tests module
//!
//! End-to-end tests of the hub router against satellites simulated with
//! wiremock, including:
//! - Fan-out across satellites, clusters and namespaces
//! - Proxying of plain HTTP and WebSocket traffic
//! - Error reporting per resource and per request

pub mod proxy_test;
pub mod reload_test;
