//! Error types for the hub module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::api::ErrorResponse;

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors raised while serving fan-out and proxy requests.
///
/// Only [`HubError::BadRequest`], [`HubError::Unauthorized`] and
/// [`HubError::ResourceNotFound`] abort a fan-out request. The remaining
/// variants are recorded as text in the error list of the affected resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Request is missing a required selector or parameter
    #[error("{0}")]
    BadRequest(String),

    /// No authenticated user is attached to the request
    #[error("you are not authorized to access the resource")]
    Unauthorized,

    /// Resource id is neither built in nor known to the resource store
    #[error("resource was not found: {0}")]
    ResourceNotFound(String),

    /// Target identifier does not have the `satellite/cluster[/namespace]` form
    #[error("malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// No satellite with the given name is registered
    #[error("satellite not found: {0}")]
    SatelliteNotFound(String),

    /// The satellite call failed
    #[error("{0}")]
    Upstream(String),
}

impl HubError {
    /// HTTP status used when the error terminates a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ResourceNotFound(_) | Self::MalformedIdentifier(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SatelliteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
