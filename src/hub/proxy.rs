//! Reverse proxy to a single satellite
//!
//! Proxy routes name their satellite in the `satellite` query parameter. The
//! request is forwarded as is, with the caller's identity attached.

use axum::{
    extract::Request,
    http::Uri,
    response::{IntoResponse, Response},
};

use crate::metrics;

use super::identity::{User, USER_HEADER};
use super::registry::SatelliteRegistry;
use super::HubError;

/// Name of the query parameter selecting the satellite
pub const SATELLITE_PARAM: &str = "satellite";

/// Metric label for requests naming no registered satellite
pub const UNKNOWN_SATELLITE_LABEL: &str = "unknown";

/// Forwards requests to the satellite they name
#[derive(Clone)]
pub struct ProxyForwarder {
    registry: SatelliteRegistry,
}

impl ProxyForwarder {
    pub fn new(registry: SatelliteRegistry) -> Self {
        Self { registry }
    }

    /// Forward a request for an authenticated user
    pub async fn forward(&self, user: &User, mut request: Request) -> Response {
        let name = match satellite_param(request.uri()) {
            Ok(name) => name,
            Err(e) => return e.into_response(),
        };

        let Some(satellite) = self.registry.get(&name) else {
            tracing::warn!(satellite = %name, path = %request.uri().path(), "Satellite not found");
            metrics::record_proxy_request(UNKNOWN_SATELLITE_LABEL, 404);
            return HubError::SatelliteNotFound(name).into_response();
        };

        match user.to_header_value() {
            Ok(value) => {
                request.headers_mut().insert(USER_HEADER, value);
            }
            Err(e) => return e.into_response(),
        }

        tracing::debug!(
            satellite = %name,
            method = %request.method(),
            path = %request.uri().path(),
            "Proxying request"
        );

        let response = satellite.proxy(request).await;
        metrics::record_proxy_request(&name, response.status().as_u16());
        response
    }
}

/// Read the satellite name from the query string
pub fn satellite_param(uri: &Uri) -> Result<String, HubError> {
    uri.query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == SATELLITE_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|name| !name.is_empty())
        .ok_or_else(|| HubError::BadRequest("satellite parameter is missing".to_string()))
}

// ============================================================================
// Tests
// ============================================================================
