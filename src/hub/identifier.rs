//! Composite target identifiers
//!
//! A target identifier names the place a resource query is sent to. Cluster
//! level targets have the form `satellite/cluster`, namespace level targets
//! the form `satellite/cluster/namespace`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::HubError;

/// Delimiter between identifier segments
pub const DELIMITER: char = '/';

// ============================================================================
// Target Identifier
// ============================================================================

/// Decoded target identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId {
    /// Name of the satellite which owns the cluster
    pub satellite: String,

    /// Cluster name as known by the satellite
    pub cluster: String,

    /// Namespace, only present for namespace level targets
    pub namespace: Option<String>,
}

impl TargetId {
    /// Create a cluster level target
    pub fn cluster(satellite: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            satellite: satellite.into(),
            cluster: cluster.into(),
            namespace: None,
        }
    }

    /// Create a namespace level target
    pub fn namespace(
        satellite: impl Into<String>,
        cluster: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            satellite: satellite.into(),
            cluster: cluster.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Decode an identifier string.
    ///
    /// Exactly two or three non-empty segments are accepted. Anything else is
    /// rejected as a whole; a partially decoded tuple is never returned.
    pub fn decode(id: &str) -> Result<Self, HubError> {
        let segments: Vec<&str> = id.split(DELIMITER).collect();

        if segments.iter().any(|s| s.is_empty()) {
            return Err(HubError::MalformedIdentifier(id.to_string()));
        }

        match segments.as_slice() {
            [satellite, cluster] => Ok(Self::cluster(*satellite, *cluster)),
            [satellite, cluster, namespace] => {
                Ok(Self::namespace(*satellite, *cluster, *namespace))
            }
            _ => Err(HubError::MalformedIdentifier(id.to_string())),
        }
    }

    /// Encode back into the identifier string
    pub fn encode(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!(
                "{}{DELIMITER}{}{DELIMITER}{}",
                self.satellite, self.cluster, namespace
            ),
            None => format!("{}{DELIMITER}{}", self.satellite, self.cluster),
        }
    }

    /// Check if this is a namespace level target
    pub fn is_namespaced(&self) -> bool {
        self.namespace.is_some()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TargetId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
