//! Storage factory

use crate::backend::{StorageBackend, StoreContext};
use crate::config::StorageType;
use crate::error::{Result, StoreError};
use crate::in_kube::InKubeStore;
use crate::metric::MetricStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Resolves storage type tags to lazily set-up backends
///
/// Each kind has exactly one backend instance for the factory's lifetime.
/// Setup runs on first resolution under a lock; a failed setup is not
/// remembered and is attempted again on the next resolution.
#[derive(Debug)]
pub struct StorageFactory {
    ctx: StoreContext,
    backends: HashMap<StorageType, Arc<dyn StorageBackend>>,
    setup_lock: Mutex<()>,
}

impl StorageFactory {
    /// Create a factory with the built-in backends
    pub fn new(ctx: StoreContext) -> Self {
        let backends: HashMap<StorageType, Arc<dyn StorageBackend>> = HashMap::from([
            (
                StorageType::InKube,
                Arc::new(InKubeStore::new()) as Arc<dyn StorageBackend>,
            ),
            (
                StorageType::HttpMetric,
                Arc::new(MetricStore::new()) as Arc<dyn StorageBackend>,
            ),
        ]);

        Self {
            ctx,
            backends,
            setup_lock: Mutex::new(()),
        }
    }

    /// Replace the backend for its kind
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backends.insert(backend.storage_type(), backend);
        self
    }

    /// Capabilities handed to backends
    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    /// Resolve a backend by its wire tag (`InKube`, `HTTPMetric`)
    pub async fn get_storage_by_name(&self, tag: &str) -> Result<Arc<dyn StorageBackend>> {
        self.get_storage(tag.parse()?).await
    }

    /// Resolve a backend, setting it up if needed
    pub async fn get_storage(&self, storage_type: StorageType) -> Result<Arc<dyn StorageBackend>> {
        let backend = self
            .backends
            .get(&storage_type)
            .cloned()
            .ok_or_else(|| StoreError::UnknownStorageType(storage_type.to_string()))?;

        if backend.is_initialized() {
            return Ok(backend);
        }

        let _guard = self.setup_lock.lock().await;
        if !backend.is_initialized() {
            backend.setup(&self.ctx).await.map_err(|e| {
                warn!(storage = %storage_type, error = %e, "Storage setup failed");
                match e {
                    e @ StoreError::StorageInitFailed { .. } => e,
                    other => StoreError::init_failed(storage_type, other),
                }
            })?;
            info!(storage = %storage_type, "Storage initialized");
        }

        Ok(backend)
    }
}
