//! Capabilities handed to plugins at init

use crate::error::Result;
use async_trait::async_trait;
use kidecar_store::k8s::{Api, ApiResource, Client, DynamicObject};
use kidecar_store::{ClusterClient, PodIdentity, StorageConfig, StorageFactory};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Key/value persistence available to plugins
///
/// The host does not ship an implementation; the slot exists so plugins can
/// be written against it and embedders can supply one.
#[async_trait]
pub trait Persistence: Send + Sync + fmt::Debug {
    /// Save a value under `key`, replacing any previous one
    async fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Load the value stored under `key`
    async fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// Shared services a plugin may use after init
#[derive(Debug, Clone)]
pub struct Capabilities {
    storage: Arc<StorageFactory>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl Capabilities {
    /// Create capabilities around a storage factory
    pub fn new(storage: Arc<StorageFactory>) -> Self {
        Self {
            storage,
            persistence: None,
        }
    }

    /// Attach a persistence implementation
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Storage factory
    pub fn storage(&self) -> &Arc<StorageFactory> {
        &self.storage
    }

    /// Cluster operations used by the storage backends
    pub fn cluster(&self) -> &Arc<dyn ClusterClient> {
        &self.storage.context().cluster
    }

    /// Shared `kube` client, for building typed `Api<K>` handles
    ///
    /// Connects on first use. Fails when the cluster seam has no real API
    /// connection behind it.
    pub async fn kube_client(&self) -> Result<Client> {
        Ok(self.cluster().kube_client().await?)
    }

    /// Schema-less API for any resource kind
    ///
    /// `namespace` of `None` addresses cluster-scoped resources, or all
    /// namespaces for namespaced ones.
    pub async fn dynamic_api(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>> {
        let client = self.kube_client().await?;
        Ok(match namespace {
            Some(ns) => Api::namespaced_with(client, ns, resource),
            None => Api::all_with(client, resource),
        })
    }

    /// Pod the sidecar runs in, when known
    pub fn pod(&self) -> Option<&PodIdentity> {
        self.storage.context().pod.as_ref()
    }

    /// Persistence, when one was attached
    pub fn persistence(&self) -> Option<&Arc<dyn Persistence>> {
        self.persistence.as_ref()
    }

    /// Store `data` through the backend selected by `config`
    pub async fn store(&self, config: &StorageConfig, data: &Value) -> Result<()> {
        config.store_data(&self.storage, data).await?;
        Ok(())
    }
}
