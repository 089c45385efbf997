//! Resource catalog
//!
//! Resolves a resource id (for example `pods` or a custom resource id) into
//! the descriptor used to query satellites. Resolution walks an ordered chain
//! of resolvers; the default chain is the built-in table followed by the
//! resource store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::HubError;

// ============================================================================
// Resource Descriptor
// ============================================================================

/// Scope of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Resource lives outside of namespaces (nodes, cluster roles, ...)
    Cluster,

    /// Resource lives inside a namespace
    Namespaced,
}

impl Scope {
    /// Check if the namespace of a target is meaningful for this scope
    pub fn uses_namespace(&self) -> bool {
        matches!(self, Self::Namespaced)
    }
}

/// Describes how a resource kind is queried on a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "isCRD")]
    pub is_crd: bool,
    /// REST path prefix, for example `/apis/apps/v1`
    pub path: String,
    /// API resource name, for example `deployments`
    pub resource: String,
    pub title: String,
    pub description: String,
    pub scope: Scope,
}

impl Resource {
    fn builtin(id: &str, path: &str, title: &str, description: &str, scope: Scope) -> Self {
        Self {
            id: id.to_string(),
            is_crd: false,
            path: path.to_string(),
            resource: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            scope,
        }
    }
}

/// Custom resource record as kept by the resource store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomResourceRecord {
    pub id: String,
    pub path: String,
    pub resource: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scope: Scope,
}

impl From<CustomResourceRecord> for Resource {
    fn from(record: CustomResourceRecord) -> Self {
        Self {
            id: record.id,
            is_crd: true,
            path: record.path,
            resource: record.resource,
            title: record.title,
            description: record.description,
            scope: record.scope,
        }
    }
}

// ============================================================================
// Built-in Table
// ============================================================================

fn builtin_table() -> &'static HashMap<String, Resource> {
    static TABLE: OnceLock<HashMap<String, Resource>> = OnceLock::new();

    TABLE.get_or_init(|| {
        use Scope::{Cluster, Namespaced};

        [
            Resource::builtin(
                "cronjobs",
                "/apis/batch/v1",
                "CronJobs",
                "A CronJob creates Jobs on a repeating schedule.",
                Namespaced,
            ),
            Resource::builtin(
                "daemonsets",
                "/apis/apps/v1",
                "DaemonSets",
                "A DaemonSet ensures that all (or some) Nodes run a copy of a Pod.",
                Namespaced,
            ),
            Resource::builtin(
                "deployments",
                "/apis/apps/v1",
                "Deployments",
                "A Deployment provides declarative updates for Pods and ReplicaSets.",
                Namespaced,
            ),
            Resource::builtin(
                "jobs",
                "/apis/batch/v1",
                "Jobs",
                "A Job creates one or more Pods and will continue to retry execution of the Pods until a specified number of them successfully terminate.",
                Namespaced,
            ),
            Resource::builtin(
                "pods",
                "/api/v1",
                "Pods",
                "Pods are the smallest deployable units of computing that you can create and manage in Kubernetes.",
                Namespaced,
            ),
            Resource::builtin(
                "replicasets",
                "/apis/apps/v1",
                "ReplicaSets",
                "A ReplicaSet's purpose is to maintain a stable set of replica Pods running at any given time.",
                Namespaced,
            ),
            Resource::builtin(
                "statefulsets",
                "/apis/apps/v1",
                "StatefulSets",
                "StatefulSet is the workload API object used to manage stateful applications.",
                Namespaced,
            ),
            Resource::builtin(
                "endpoints",
                "/api/v1",
                "Endpoints",
                "Endpoints is a collection of endpoints that implement the actual service.",
                Namespaced,
            ),
            Resource::builtin(
                "horizontalpodautoscalers",
                "/apis/autoscaling/v2",
                "Horizontal Pod Autoscalers",
                "The Horizontal Pod Autoscaler automatically scales the number of Pods in a workload resource.",
                Namespaced,
            ),
            Resource::builtin(
                "ingresses",
                "/apis/networking.k8s.io/v1",
                "Ingresses",
                "An API object that manages external access to the services in a cluster, typically HTTP.",
                Namespaced,
            ),
            Resource::builtin(
                "networkpolicies",
                "/apis/networking.k8s.io/v1",
                "Network Policies",
                "Network Policies control traffic flow at the IP address or port level.",
                Namespaced,
            ),
            Resource::builtin(
                "services",
                "/api/v1",
                "Services",
                "An abstract way to expose an application running on a set of Pods as a network service.",
                Namespaced,
            ),
            Resource::builtin(
                "configmaps",
                "/api/v1",
                "ConfigMaps",
                "A ConfigMap is an API object used to store non-confidential data in key-value pairs.",
                Namespaced,
            ),
            Resource::builtin(
                "persistentvolumeclaims",
                "/api/v1",
                "Persistent Volume Claims",
                "A PersistentVolumeClaim is a request for storage by a user.",
                Namespaced,
            ),
            Resource::builtin(
                "persistentvolumes",
                "/api/v1",
                "Persistent Volumes",
                "A PersistentVolume is a piece of storage in the cluster.",
                Cluster,
            ),
            Resource::builtin(
                "poddisruptionbudgets",
                "/apis/policy/v1",
                "Pod Disruption Budgets",
                "A PDB limits the number of Pods of a replicated application that are down simultaneously from voluntary disruptions.",
                Namespaced,
            ),
            Resource::builtin(
                "secrets",
                "/api/v1",
                "Secrets",
                "A Secret is an object that contains a small amount of sensitive data such as a password, a token, or a key.",
                Namespaced,
            ),
            Resource::builtin(
                "serviceaccounts",
                "/api/v1",
                "Service Accounts",
                "A service account provides an identity for processes that run in a Pod.",
                Namespaced,
            ),
            Resource::builtin(
                "storageclasses",
                "/apis/storage.k8s.io/v1",
                "Storage Classes",
                "A StorageClass provides a way for administrators to describe the classes of storage they offer.",
                Cluster,
            ),
            Resource::builtin(
                "clusterrolebindings",
                "/apis/rbac.authorization.k8s.io/v1",
                "Cluster Role Bindings",
                "A ClusterRoleBinding grants the permissions defined in a cluster role cluster-wide.",
                Cluster,
            ),
            Resource::builtin(
                "clusterroles",
                "/apis/rbac.authorization.k8s.io/v1",
                "Cluster Roles",
                "A ClusterRole contains rules that represent a set of cluster wide permissions.",
                Cluster,
            ),
            Resource::builtin(
                "rolebindings",
                "/apis/rbac.authorization.k8s.io/v1",
                "Role Bindings",
                "A RoleBinding grants the permissions defined in a role to a user or set of users.",
                Namespaced,
            ),
            Resource::builtin(
                "roles",
                "/apis/rbac.authorization.k8s.io/v1",
                "Roles",
                "A Role contains rules that represent a set of permissions within a namespace.",
                Namespaced,
            ),
            Resource::builtin(
                "events",
                "/api/v1",
                "Events",
                "Events are reports of state changes of other objects.",
                Namespaced,
            ),
            Resource::builtin(
                "nodes",
                "/api/v1",
                "Nodes",
                "Kubernetes runs your workload by placing containers into Pods to run on Nodes.",
                Cluster,
            ),
            Resource::builtin(
                "namespaces",
                "/api/v1",
                "Namespaces",
                "Namespaces provide a mechanism for isolating groups of resources within a single cluster.",
                Cluster,
            ),
            Resource::builtin(
                "customresourcedefinitions",
                "/apis/apiextensions.k8s.io/v1",
                "Custom Resource Definitions",
                "Custom resources are extensions of the Kubernetes API.",
                Cluster,
            ),
        ]
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect()
    })
}

/// Look up a resource in the built-in table
pub fn builtin_resource(id: &str) -> Option<&'static Resource> {
    builtin_table().get(id)
}

// ============================================================================
// Resource Store
// ============================================================================

/// Store for custom resource records
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a custom resource record by id
    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<CustomResourceRecord>>;
}

/// In-memory resource store, seeded from configuration
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    records: HashMap<String, CustomResourceRecord>,
}

impl MemoryResourceStore {
    /// Create a store holding the given records
    pub fn new(records: impl IntoIterator<Item = CustomResourceRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<CustomResourceRecord>> {
        Ok(self.records.get(id).cloned())
    }
}

// ============================================================================
// Resolver Chain
// ============================================================================

/// One tier of the resolver chain
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Name of the tier, used in logs
    fn name(&self) -> &'static str;

    /// Resolve the id, `Ok(None)` passes on to the next tier
    async fn resolve(&self, id: &str) -> anyhow::Result<Option<Resource>>;
}

/// Resolver backed by the built-in table
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinResolver;

#[async_trait]
impl ResourceResolver for BuiltinResolver {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn resolve(&self, id: &str) -> anyhow::Result<Option<Resource>> {
        Ok(builtin_resource(id).cloned())
    }
}

/// Resolver backed by a [`ResourceStore`], one read per call
pub struct StoreResolver {
    store: Arc<dyn ResourceStore>,
}

impl StoreResolver {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceResolver for StoreResolver {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn resolve(&self, id: &str) -> anyhow::Result<Option<Resource>> {
        Ok(self.store.get_by_id(id).await?.map(Resource::from))
    }
}

/// Ordered chain of resolvers
#[derive(Clone)]
pub struct ResourceCatalog {
    tiers: Vec<Arc<dyn ResourceResolver>>,
}

impl ResourceCatalog {
    /// Create a catalog with an explicit tier order
    pub fn new(tiers: Vec<Arc<dyn ResourceResolver>>) -> Self {
        Self { tiers }
    }

    /// Built-in table first, then the given store
    pub fn with_store(store: Arc<dyn ResourceStore>) -> Self {
        Self::new(vec![
            Arc::new(BuiltinResolver),
            Arc::new(StoreResolver::new(store)),
        ])
    }

    /// Names of the tiers in lookup order
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Resolve a resource id.
    ///
    /// A tier that fails is treated like a miss for that id, so lookup errors
    /// surface as [`HubError::ResourceNotFound`].
    pub async fn resolve(&self, id: &str) -> Result<Resource, HubError> {
        for tier in &self.tiers {
            match tier.resolve(id).await {
                Ok(Some(resource)) => {
                    tracing::debug!(resource_id = %id, tier = tier.name(), "Resolved resource");
                    return Ok(resource);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(
                        resource_id = %id,
                        tier = tier.name(),
                        error = %e,
                        "Resource lookup failed"
                    );
                    return Err(HubError::ResourceNotFound(id.to_string()));
                }
            }
        }

        Err(HubError::ResourceNotFound(id.to_string()))
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::with_store(Arc::new(MemoryResourceStore::default()))
    }
}

// ============================================================================
// Tests
// ============================================================================
