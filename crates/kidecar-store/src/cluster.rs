//! Cluster API seam
//!
//! [`ClusterClient`] is the narrow set of calls the storage backends make
//! against the cluster. [`KubeClusterClient`] implements it with `kube`,
//! using a schema-less [`DynamicObject`] API for arbitrary resource kinds.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use kube::Client;
use parking_lot::Mutex;
use serde_json::Value;
use std::env;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::debug;

/// Env var holding the current pod's namespace
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Env var holding the current pod's name
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Namespace and name of the pod the sidecar runs in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodIdentity {
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub name: String,
}

impl PodIdentity {
    /// Create a new pod identity
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Read the identity from `POD_NAMESPACE` and `POD_NAME`
    pub fn from_env() -> Result<Self> {
        let namespace = env::var(POD_NAMESPACE_ENV).unwrap_or_default();
        let name = env::var(POD_NAME_ENV).unwrap_or_default();
        if namespace.is_empty() || name.is_empty() {
            return Err(StoreError::CurrentPod(format!(
                "{POD_NAMESPACE_ENV} and {POD_NAME_ENV} must both be set"
            )));
        }
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Fully resolved coordinate of an object to patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// API group, empty for core
    pub group: String,
    /// API version
    pub version: String,
    /// Plural resource name
    pub resource: String,
    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectRef {
    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)?;
        if !self.namespace.is_empty() {
            write!(f, "/{}", self.namespace)?;
        }
        write!(f, "/{}", self.name)
    }
}

/// Cluster operations used by the storage backends
#[async_trait]
pub trait ClusterClient: Send + Sync + fmt::Debug {
    /// Fetch a pod
    async fn get_pod(&self, pod: &PodIdentity) -> Result<Pod>;

    /// Apply a strategic merge patch to a pod
    async fn patch_pod(&self, pod: &PodIdentity, patch: &Value) -> Result<()>;

    /// Apply a JSON Patch to any object
    async fn patch_object(&self, target: &ObjectRef, patch: &json_patch::Patch) -> Result<()>;

    /// Full API client for typed and schema-less access
    ///
    /// Clients that do not talk to a real API server return an error.
    async fn kube_client(&self) -> Result<Client> {
        Err(StoreError::kube("cluster client has no API connection"))
    }
}

/// [`ClusterClient`] backed by `kube`
///
/// The underlying client is created on first use from the in-cluster or
/// kubeconfig environment; a failed attempt is retried on the next call.
pub struct KubeClusterClient {
    client: OnceCell<Client>,
}

impl KubeClusterClient {
    /// Create a client that connects lazily
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client
            .get_or_try_init(|| async {
                Client::try_default()
                    .await
                    .map_err(|e| StoreError::kube(format!("Failed to create K8s client: {e}")))
            })
            .await
            .cloned()
    }
}

impl Default for KubeClusterClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClusterClient")
            .field("connected", &self.client.initialized())
            .finish()
    }
}

fn map_kube_error(context: impl fmt::Display, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(response) if response.code == 409 => {
            StoreError::Conflict(format!("{context}: {}", response.message))
        }
        other => StoreError::kube(format!("{context}: {other}")),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn kube_client(&self) -> Result<Client> {
        self.client().await
    }

    async fn get_pod(&self, pod: &PodIdentity) -> Result<Pod> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, &pod.namespace);
        pods.get(&pod.name)
            .await
            .map_err(|e| map_kube_error(format_args!("Failed to get pod {pod}"), e))
    }

    async fn patch_pod(&self, pod: &PodIdentity, patch: &Value) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, &pod.namespace);
        pods.patch(&pod.name, &PatchParams::default(), &Patch::Strategic(patch))
            .await
            .map_err(|e| map_kube_error(format_args!("Failed to patch pod {pod}"), e))?;
        Ok(())
    }

    async fn patch_object(&self, target: &ObjectRef, patch: &json_patch::Patch) -> Result<()> {
        let resource = ApiResource {
            group: target.group.clone(),
            version: target.version.clone(),
            api_version: target.api_version(),
            kind: String::new(),
            plural: target.resource.clone(),
        };

        let client = self.client().await?;
        let api: Api<DynamicObject> = if target.namespace.is_empty() {
            Api::all_with(client, &resource)
        } else {
            Api::namespaced_with(client, &target.namespace, &resource)
        };

        api.patch(
            &target.name,
            &PatchParams::default(),
            &Patch::Json::<()>(patch.clone()),
        )
        .await
        .map_err(|e| map_kube_error(format_args!("Failed to patch {target}"), e))?;
        Ok(())
    }
}

/// Current pod object, refetched once older than the TTL
#[derive(Debug)]
pub(crate) struct CachedPod {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Pod)>>,
}

impl CachedPod {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub(crate) async fn get(&self, client: &dyn ClusterClient, pod: &PodIdentity) -> Result<Pod> {
        let cached = {
            let entry = self.entry.lock();
            entry
                .as_ref()
                .filter(|(fetched_at, _)| fetched_at.elapsed() < self.ttl)
                .map(|(_, pod)| pod.clone())
        };
        if let Some(pod) = cached {
            return Ok(pod);
        }

        debug!(pod = %pod, "Fetching current pod");
        let fresh = client.get_pod(pod).await?;
        *self.entry.lock() = Some((Instant::now(), fresh.clone()));
        Ok(fresh)
    }
}
