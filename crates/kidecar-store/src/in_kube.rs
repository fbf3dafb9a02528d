//! InKube storage: current pod metadata and arbitrary object patches

use crate::backend::{StorageBackend, StoreContext};
use crate::cluster::{CachedPod, ClusterClient, ObjectRef, PodIdentity};
use crate::config::{InKubeConfig, StorageConfig, StorageType, Target};
use crate::error::{Result, StoreError};
use crate::patch::{pod_metadata_patch, target_json_patch};
use crate::retry::{retry_on_conflict, Backoff};
use crate::template::TemplateResolver;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

const CURRENT_POD_TTL: Duration = Duration::from_secs(60);

/// Writes plugin results into the current pod and, optionally, another object
#[derive(Default)]
pub struct InKubeStore {
    state: OnceLock<InKubeState>,
    backoff: Backoff,
}

struct InKubeState {
    cluster: Arc<dyn ClusterClient>,
    pod: PodIdentity,
    current_pod: CachedPod,
    resolver: TemplateResolver,
}

impl InKubeStore {
    /// Create an uninitialized store
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom conflict backoff
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn state(&self) -> Result<&InKubeState> {
        self.state
            .get()
            .ok_or_else(|| StoreError::NotInitialized(StorageType::InKube.to_string()))
    }

    async fn resolve_target(&self, state: &InKubeState, target: &Target) -> Result<ObjectRef> {
        let pod = state
            .current_pod
            .get(state.cluster.as_ref(), &state.pod)
            .await?;
        let container = pod.spec.as_ref().and_then(|spec| spec.containers.first());

        let mut namespace = state.resolver.resolve(&target.namespace, container)?;
        let name = state.resolver.resolve(&target.name, container)?;

        if namespace.is_empty() && target.is_pod_owner {
            namespace = state.pod.namespace.clone();
        }

        Ok(ObjectRef {
            group: target.group.clone(),
            version: target.version.clone(),
            resource: target.resource.clone(),
            namespace,
            name,
        })
    }

    async fn store_in_current_pod(
        &self,
        state: &InKubeState,
        data: &str,
        config: &InKubeConfig,
    ) -> Result<()> {
        let Some(patch) = pod_metadata_patch(data, config) else {
            debug!(pod = %state.pod, "Nothing to write on current pod");
            return Ok(());
        };

        debug!(pod = %state.pod, patch = %patch, "Patching current pod");
        retry_on_conflict(self.backoff, || state.cluster.patch_pod(&state.pod, &patch)).await
    }

    async fn store_in_target(
        &self,
        state: &InKubeState,
        data: &str,
        config: &InKubeConfig,
        target: &ObjectRef,
    ) -> Result<()> {
        let patch = target_json_patch(data, config)?;
        if patch.0.is_empty() {
            debug!(target = %target, "Nothing to write on target");
            return Ok(());
        }

        debug!(target = %target, ops = patch.0.len(), "Patching target object");
        retry_on_conflict(self.backoff, || state.cluster.patch_object(target, &patch)).await
    }
}

impl fmt::Debug for InKubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InKubeStore")
            .field("initialized", &self.is_initialized())
            .field("pod", &self.state.get().map(|s| &s.pod))
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for InKubeStore {
    fn storage_type(&self) -> StorageType {
        StorageType::InKube
    }

    fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    async fn setup(&self, ctx: &StoreContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let pod = ctx
            .pod
            .clone()
            .ok_or_else(|| StoreError::init_failed(StorageType::InKube, "current pod identity is unknown"))?;
        let resolver = TemplateResolver::new()
            .map_err(|e| StoreError::init_failed(StorageType::InKube, e))?;

        let current_pod = CachedPod::new(CURRENT_POD_TTL);
        current_pod
            .get(ctx.cluster.as_ref(), &pod)
            .await
            .map_err(|e| StoreError::init_failed(StorageType::InKube, e))?;

        info!(pod = %pod, "InKube storage ready");

        let _ = self.state.set(InKubeState {
            cluster: ctx.cluster.clone(),
            pod,
            current_pod,
            resolver,
        });
        Ok(())
    }

    async fn store(&self, data: &str, config: &StorageConfig) -> Result<()> {
        let StorageConfig::InKube { in_kube } = config else {
            return Err(StoreError::invalid_config(format!(
                "InKube storage cannot store {} config",
                config.storage_type()
            )));
        };
        let state = self.state()?;

        in_kube.validate()?;

        let target = match &in_kube.target {
            Some(target) => Some(self.resolve_target(state, target).await?),
            None => None,
        };

        self.store_in_current_pod(state, data, in_kube).await?;

        match target {
            Some(target) if !in_kube.marker_policies.is_empty() => {
                self.store_in_target(state, data, in_kube, &target).await?;
            }
            _ => {}
        }

        debug!(pod = %state.pod, data, "Stored in kube");
        Ok(())
    }
}
