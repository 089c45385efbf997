//! Fan-out resource aggregation
//!
//! A resource query is answered by a two level tree of tasks:
//!
//! ```text
//!                       aggregate
//!                /          |           \
//!        branch(pods)  branch(nodes)  branch(...)      one per resource id
//!         /      \        /     \
//!     leaf(t1) leaf(t2) leaf(t1) leaf(t2)              one per target id
//! ```
//!
//! Every leaf sends exactly one outcome into its branch's queue and every
//! branch sends exactly one outcome into the top level queue. Each queue has a
//! single collector; a collector is done once all senders are dropped, which
//! is the barrier for its level.
//!
//! Only an unknown resource id fails the whole query. All other failures are
//! recorded as text in the `errors` of the affected [`ResourceResponse`].
//! Leaves run as detached tasks bounded by their own timeout, so a client
//! that goes away does not cancel satellite calls already in flight.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::metrics;

use super::catalog::{Resource, ResourceCatalog};
use super::identifier::TargetId;
use super::identity::User;
use super::registry::{Generation, SatelliteRegistry};
use super::satellite::{ListRequest, SatelliteError};
use super::HubError;

/// Timeout for a single satellite list call
pub const DEFAULT_LEAF_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Query and Response Types
// ============================================================================

/// Resource query as received from the API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub resource_ids: Vec<String>,
    pub cluster_ids: Vec<String>,
    pub namespace_ids: Vec<String>,
    pub name: String,
    /// Replaces the resource's path for this query when not empty
    pub path: String,
    pub param_name: String,
    pub param: String,
}

impl ResourceQuery {
    /// Select the target ids.
    ///
    /// Namespace ids take precedence; cluster ids are only used when no
    /// namespace id is given.
    pub fn targets(&self) -> Result<&[String], HubError> {
        if !self.namespace_ids.is_empty() {
            Ok(&self.namespace_ids)
        } else if !self.cluster_ids.is_empty() {
            Ok(&self.cluster_ids)
        } else {
            Err(HubError::BadRequest(
                "no cluster or namespace selector supplied".to_string(),
            ))
        }
    }
}

/// Lists of one resource from all targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub resource: Resource,
    pub resource_lists: Vec<ResourceList>,
    pub errors: Vec<String>,
}

impl ResourceResponse {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            resource_lists: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// List returned by one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    pub satellite: String,
    pub cluster: String,
    pub list: serde_json::Value,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Runs resource queries against all selected targets
#[derive(Clone)]
pub struct FanoutAggregator {
    registry: SatelliteRegistry,
    catalog: ResourceCatalog,
    leaf_timeout: Duration,
}

/// State shared by all tasks of one query
struct Fanout {
    satellites: Arc<Generation>,
    catalog: ResourceCatalog,
    leaf_timeout: Duration,
    user: User,
    targets: Vec<String>,
    query: ResourceQuery,
}

type LeafOutcome = Result<ResourceList, String>;
type BranchOutcome = Result<ResourceResponse, HubError>;

impl FanoutAggregator {
    pub fn new(registry: SatelliteRegistry, catalog: ResourceCatalog) -> Self {
        Self {
            registry,
            catalog,
            leaf_timeout: DEFAULT_LEAF_TIMEOUT,
        }
    }

    /// Override the per-leaf timeout
    pub fn with_leaf_timeout(mut self, timeout: Duration) -> Self {
        self.leaf_timeout = timeout;
        self
    }

    pub fn leaf_timeout(&self) -> Duration {
        self.leaf_timeout
    }

    /// Run a query.
    ///
    /// The order of the returned responses, and of the lists inside each
    /// response, depends on completion order and carries no meaning.
    pub async fn aggregate(
        &self,
        user: &User,
        query: ResourceQuery,
    ) -> Result<Vec<ResourceResponse>, HubError> {
        if query.resource_ids.is_empty() {
            return Err(HubError::BadRequest("no resource id supplied".to_string()));
        }
        let targets = query.targets()?.to_vec();

        let request_id = uuid::Uuid::new_v4();
        tracing::debug!(
            %request_id,
            resources = query.resource_ids.len(),
            targets = targets.len(),
            width = query.resource_ids.len() * targets.len(),
            "Starting resource fan-out"
        );
        metrics::record_fanout_request();

        let resource_ids = query.resource_ids.clone();
        let fanout = Arc::new(Fanout {
            satellites: self.registry.snapshot(),
            catalog: self.catalog.clone(),
            leaf_timeout: self.leaf_timeout,
            user: user.clone(),
            targets,
            query,
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<BranchOutcome>();
        for resource_id in resource_ids {
            let tx = tx.clone();
            let fanout = Arc::clone(&fanout);
            let span = tracing::debug_span!("branch", %request_id, resource_id = %resource_id);

            tokio::spawn(
                async move {
                    let _ = tx.send(branch(fanout, resource_id).await);
                }
                .instrument(span),
            );
        }
        drop(tx);

        let mut responses = Vec::new();
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(response) => responses.push(response),
                Err(e) => {
                    tracing::error!(%request_id, error = %e, "Resource fan-out aborted");
                    return Err(e);
                }
            }
        }

        tracing::debug!(%request_id, responses = responses.len(), "Resource fan-out complete");
        Ok(responses)
    }
}

async fn branch(fanout: Arc<Fanout>, resource_id: String) -> BranchOutcome {
    let resource = Arc::new(fanout.catalog.resolve(&resource_id).await?);

    let (tx, mut rx) = mpsc::unbounded_channel::<LeafOutcome>();
    for target in &fanout.targets {
        let tx = tx.clone();
        let fanout = Arc::clone(&fanout);
        let resource = Arc::clone(&resource);
        let target = target.clone();

        tokio::spawn(
            async move {
                let _ = tx.send(leaf(&fanout, &resource, &target).await);
            }
            .in_current_span(),
        );
    }
    drop(tx);

    let mut response = ResourceResponse::new(Resource::clone(&resource));
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Ok(list) => response.resource_lists.push(list),
            Err(e) => response.errors.push(e),
        }
    }

    Ok(response)
}

async fn leaf(fanout: &Fanout, resource: &Resource, target: &str) -> LeafOutcome {
    let id = TargetId::decode(target).map_err(|e| {
        tracing::error!(target_id = %target, error = %e, "Could not parse target id");
        e.to_string()
    })?;

    let satellite = fanout.satellites.get(&id.satellite).ok_or_else(|| {
        tracing::error!(satellite = %id.satellite, "Satellite not found");
        HubError::SatelliteNotFound(id.satellite.clone()).to_string()
    })?;

    let namespace = if resource.scope.uses_namespace() {
        id.namespace.clone().unwrap_or_default()
    } else {
        String::new()
    };

    let path = if fanout.query.path.is_empty() {
        resource.path.clone()
    } else {
        fanout.query.path.clone()
    };

    let request = ListRequest {
        cluster: id.cluster.clone(),
        namespace,
        name: fanout.query.name.clone(),
        resource: resource.resource.clone(),
        path,
        param_name: fanout.query.param_name.clone(),
        param: fanout.query.param.clone(),
    };

    let started = Instant::now();
    let result = tokio::time::timeout(
        fanout.leaf_timeout,
        satellite.list_resources(&fanout.user, &request),
    )
    .await
    .unwrap_or_else(|_| Err(SatelliteError::Timeout(id.satellite.clone())));

    match result {
        Ok(list) => {
            metrics::record_leaf("success", started.elapsed());
            Ok(ResourceList {
                satellite: id.satellite,
                cluster: id.cluster,
                list,
            })
        }
        Err(e) => {
            metrics::record_leaf("error", started.elapsed());
            tracing::error!(
                satellite = %id.satellite,
                cluster = %id.cluster,
                error = %e,
                "Request failed"
            );
            Err(e.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
