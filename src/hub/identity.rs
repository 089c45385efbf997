//! Authenticated user identity
//!
//! Authentication happens in front of the hub. The hub only picks up the
//! identity established there, attaches it to the request and forwards it to
//! satellites in the [`USER_HEADER`] header.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::HubError;

/// Header carrying the serialized user to satellites
pub const USER_HEADER: &str = "x-kobs-user";

// ============================================================================
// User
// ============================================================================

/// Authenticated user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub teams: Vec<String>,
    /// Permissions are evaluated by satellites, the hub passes them through
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub permissions: serde_json::Value,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: email.clone(),
            email,
            teams: Vec::new(),
            permissions: serde_json::Value::Null,
        }
    }

    pub fn with_teams(mut self, teams: Vec<String>) -> Self {
        self.teams = teams;
        self
    }

    /// Serialize into the form satellites read from [`USER_HEADER`]
    pub fn to_header_value(&self) -> Result<HeaderValue, HubError> {
        let json = serde_json::to_string(self)
            .map_err(|e| HubError::BadRequest(format!("could not serialize user: {e}")))?;
        HeaderValue::from_str(&json)
            .map_err(|e| HubError::BadRequest(format!("user is not a valid header value: {e}")))
    }
}

// ============================================================================
// Identity Provider
// ============================================================================

/// Source of the authenticated user for a request
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the current user, [`HubError::Unauthorized`] if there is none
    async fn current_user(&self, headers: &HeaderMap) -> Result<User, HubError>;
}

/// Reads the identity from headers set by an authenticating reverse proxy
#[derive(Debug, Clone)]
pub struct HeaderIdentityProvider {
    user_header: HeaderName,
    teams_header: HeaderName,
}

impl HeaderIdentityProvider {
    pub fn new(user_header: &str, teams_header: &str) -> Result<Self, HubError> {
        let parse = |name: &str| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HubError::BadRequest(format!("invalid header name: {name}")))
        };

        Ok(Self {
            user_header: parse(user_header)?,
            teams_header: parse(teams_header)?,
        })
    }
}

impl Default for HeaderIdentityProvider {
    fn default() -> Self {
        Self {
            user_header: HeaderName::from_static("x-forwarded-email"),
            teams_header: HeaderName::from_static("x-forwarded-groups"),
        }
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    async fn current_user(&self, headers: &HeaderMap) -> Result<User, HubError> {
        let email = headers
            .get(&self.user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(HubError::Unauthorized)?;

        let teams = headers
            .get(&self.teams_header)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(User::new(email).with_teams(teams))
    }
}

// ============================================================================
// Middleware and Extractor
// ============================================================================

/// Attach the current user to the request extensions when there is one.
///
/// Requests without a user continue; handlers that need one reject them
/// through the [`CurrentUser`] extractor.
pub async fn identify(
    State(provider): State<Arc<dyn IdentityProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    match provider.current_user(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
        }
        Err(e) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "No authenticated user");
        }
    }

    next.run(request).await
}

/// Extractor for the authenticated user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or(HubError::Unauthorized)
    }
}
