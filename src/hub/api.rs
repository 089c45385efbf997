//! REST API handlers for the hub server
//!
//! This module defines the API routes and handlers for the hub.

use axum::{
    extract::{RawQuery, Request, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::metrics;

use super::fanout::{ResourceQuery, ResourceResponse};
use super::identity::{identify, CurrentUser};
use super::registry::RegistryInfo;
use super::server::AppState;
use super::HubError;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub satellites: usize,
}

// ============================================================================
// Query Parsing
// ============================================================================

/// Parse the query string of a resource request.
///
/// `resourceID`, `clusterID` and `namespaceID` may be repeated. Unknown keys
/// are ignored.
pub fn parse_resource_query(query: Option<&str>) -> ResourceQuery {
    let mut parsed = ResourceQuery::default();

    let Some(query) = query else {
        return parsed;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.into_owned();
        match key.as_ref() {
            "resourceID" => parsed.resource_ids.push(value),
            "clusterID" => parsed.cluster_ids.push(value),
            "namespaceID" => parsed.namespace_ids.push(value),
            "name" => parsed.name = value,
            "path" => parsed.path = value,
            "paramName" => parsed.param_name = value,
            "param" => parsed.param = value,
            _ => {}
        }
    }

    parsed
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let identity = state.identity.clone();

    Router::new()
        // Health and status endpoints
        .route("/api/health", get(health_check))
        .route("/api/satellites", get(list_satellites))
        .route("/metrics", get(metrics_handler))
        // Fan-out endpoint
        .route("/api/resources/_", get(get_resources))
        // Proxy endpoints
        .route(
            "/api/resources",
            get(proxy_request)
                .post(proxy_request)
                .put(proxy_request)
                .delete(proxy_request),
        )
        .route("/api/resources/logs", get(proxy_request))
        .route("/api/resources/terminal", get(proxy_request))
        .route("/api/resources/file", get(proxy_request).post(proxy_request))
        .layer(middleware::from_fn_with_state(identity, identify))
        .with_state(state)
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        satellites: state.registry.snapshot().len(),
    }))
}

/// List registered satellites
async fn list_satellites(State(state): State<AppState>) -> Json<ApiResponse<RegistryInfo>> {
    Json(ApiResponse::success(state.registry.info()))
}

/// Prometheus metrics endpoint
async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to encode metrics: {}", e))),
        )
            .into_response(),
    }
}

// ============================================================================
// Resource Handlers
// ============================================================================

/// Fan a resource query out to all selected clusters
async fn get_resources(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<ResourceResponse>>, HubError> {
    let query = parse_resource_query(query.as_deref());
    let responses = state.aggregator.aggregate(&user, query).await?;
    Ok(Json(responses))
}

/// Forward a request to the satellite named in the query
async fn proxy_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: Request,
) -> Response {
    state.proxy.forward(&user, request).await
}

// ============================================================================
// Tests
// ============================================================================
