//! Satellite clients
//!
//! A satellite exposes two capabilities to the hub: listing resources of a
//! cluster and reverse proxying arbitrary requests. [`HttpSatellite`] talks to
//! a satellite over its HTTP API.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::SatelliteConfig;

use super::identity::{User, USER_HEADER};
use super::transport;
use super::HubError;

// ============================================================================
// Satellite Capability
// ============================================================================

/// Parameters of one list call against one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub cluster: String,
    /// Empty for cluster scoped resources and cluster level targets
    pub namespace: String,
    pub name: String,
    pub resource: String,
    pub path: String,
    pub param_name: String,
    pub param: String,
}

/// Capabilities the hub needs from a satellite
#[async_trait]
pub trait Satellite: Send + Sync {
    /// Name the satellite is registered under
    fn name(&self) -> &str;

    /// List resources of one cluster and return the decoded list
    async fn list_resources(
        &self,
        user: &User,
        request: &ListRequest,
    ) -> Result<serde_json::Value, SatelliteError>;

    /// Forward a request, the user header is already set by the caller
    async fn proxy(&self, request: Request) -> Response;
}

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by satellite calls
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SatelliteError {
    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("request to satellite {0} timed out")]
    Timeout(String),
}

/// Error body returned by satellites
#[derive(Debug, Deserialize)]
struct SatelliteErrorBody {
    error: String,
}

// ============================================================================
// HTTP Satellite
// ============================================================================

/// Satellite reached over HTTP
pub struct HttpSatellite {
    name: String,
    address: Url,
    token: Option<String>,
    http_client: Client,
    proxy_client: Client,
}

impl HttpSatellite {
    /// Create a client for the configured satellite
    pub fn new(config: &SatelliteConfig) -> Result<Self, SatelliteError> {
        let address = Url::parse(&config.address)
            .map_err(|e| SatelliteError::Init(format!("invalid address {}: {e}", config.address)))?;

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

        let http_client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("satellite-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SatelliteError::Init(e.to_string()))?;

        // Bodies are passed through untouched, so no transparent decompression
        let proxy_client = Client::builder()
            .connect_timeout(connect_timeout)
            .no_gzip()
            .build()
            .map_err(|e| SatelliteError::Init(e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            address,
            token: config.token.clone(),
            http_client,
            proxy_client,
        })
    }

    /// Base address of the satellite
    pub fn address(&self) -> &Url {
        &self.address
    }

    fn bearer(&self) -> Option<HeaderValue> {
        self.token
            .as_ref()
            .and_then(|t| HeaderValue::from_str(&format!("Bearer {t}")).ok())
    }
}

#[async_trait]
impl Satellite for HttpSatellite {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_resources(
        &self,
        user: &User,
        request: &ListRequest,
    ) -> Result<serde_json::Value, SatelliteError> {
        let url = self
            .address
            .join("/api/resources")
            .map_err(|e| SatelliteError::Init(e.to_string()))?;

        let user_header = user
            .to_header_value()
            .map_err(|e| SatelliteError::Init(e.to_string()))?;

        let mut builder = self
            .http_client
            .get(url)
            .header(USER_HEADER, user_header)
            .query(&[
                ("cluster", request.cluster.as_str()),
                ("namespace", request.namespace.as_str()),
                ("name", request.name.as_str()),
                ("resource", request.resource.as_str()),
                ("path", request.path.as_str()),
                ("paramName", request.param_name.as_str()),
                ("param", request.param.as_str()),
            ]);
        if let Some(bearer) = self.bearer() {
            builder = builder.header(header::AUTHORIZATION, bearer);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SatelliteError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| SatelliteError::Parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<SatelliteErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status.to_string()
                } else {
                    body
                }
            });

        Err(SatelliteError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn proxy(&self, request: Request) -> Response {
        let target = match transport::target_url(&self.address, &request) {
            Ok(target) => target,
            Err(e) => return e.into_response(),
        };

        let extra = transport::header_map([("authorization", self.bearer())]);

        let result = if transport::is_websocket_upgrade(request.headers()) {
            transport::forward_websocket(target, request, extra).await
        } else {
            transport::forward_http(&self.proxy_client, target, request, extra).await
        };

        result.unwrap_or_else(|e: HubError| {
            tracing::error!(satellite = %self.name, error = %e, "Proxy request failed");
            e.into_response()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
