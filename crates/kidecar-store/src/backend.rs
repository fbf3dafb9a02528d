//! Storage backend trait definition

use crate::cluster::{ClusterClient, PodIdentity};
use crate::config::{StorageConfig, StorageType};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Storage backend trait
///
/// A backend is set up at most once successfully; [`StorageFactory`](crate::StorageFactory)
/// calls [`setup`](StorageBackend::setup) on first resolution and again only
/// if a previous attempt failed.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Kind of this backend
    fn storage_type(&self) -> StorageType;

    /// Whether setup has completed
    fn is_initialized(&self) -> bool;

    /// Acquire clients, registries and listeners
    async fn setup(&self, ctx: &StoreContext) -> Result<()>;

    /// Store one stringified value according to `config`
    ///
    /// `config` must be the variant matching [`storage_type`](StorageBackend::storage_type).
    async fn store(&self, data: &str, config: &StorageConfig) -> Result<()>;
}

/// Capabilities handed to backends during setup
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Cluster API access
    pub cluster: Arc<dyn ClusterClient>,

    /// Pod the sidecar runs in
    pub pod: Option<PodIdentity>,

    /// Where the metric backend serves `/metrics`; `None` keeps the registry in-process
    pub metrics_listen: Option<SocketAddr>,
}

impl StoreContext {
    /// Create a context with cluster access only
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            pod: None,
            metrics_listen: None,
        }
    }

    /// Set the current pod identity
    pub fn with_pod(mut self, pod: PodIdentity) -> Self {
        self.pod = Some(pod);
        self
    }

    /// Serve the metric registry on `addr`
    pub fn with_metrics_listen(mut self, addr: SocketAddr) -> Self {
        self.metrics_listen = Some(addr);
        self
    }
}
