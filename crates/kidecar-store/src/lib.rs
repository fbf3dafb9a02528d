//! # Kidecar Storage
//!
//! Routes data produced by plugins to where it is consumed:
//!
//! - **InKube**: writes the value into the current pod's labels and
//!   annotations (strategic merge patch), and optionally into an arbitrary
//!   other object addressed by resource coordinate (JSON Patch)
//! - **HTTPMetric**: exports the value as a Prometheus gauge on `/metrics`
//!
//! Backends are resolved through a [`StorageFactory`] and set up lazily on
//! first use. Target identities may reference `${SELF:NAME}` (sidecar
//! environment) or `${POD:NAME}` (main container environment) placeholders.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kidecar_store::{KubeClusterClient, PodIdentity, StorageConfig, StorageFactory, StoreContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> kidecar_store::Result<()> {
//! let ctx = StoreContext::new(Arc::new(KubeClusterClient::new()))
//!     .with_pod(PodIdentity::from_env()?);
//! let factory = StorageFactory::new(ctx);
//!
//! let config: StorageConfig = serde_json::from_value(serde_json::json!({
//!     "type": "InKube",
//!     "inKube": {"annotationKey": "probe-result"}
//! }))?;
//! config.store_data(&factory, &serde_json::json!("Healthy")).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod backend;
mod cluster;
mod config;
mod error;
mod factory;
mod in_kube;
mod metric;
pub mod patch;
pub mod retry;
pub mod template;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{StorageBackend, StoreContext};
pub use cluster::{
    ClusterClient, KubeClusterClient, ObjectRef, PodIdentity, POD_NAMESPACE_ENV, POD_NAME_ENV,
};
pub use config::{
    stringify_data, HttpMetricConfig, InKubeConfig, MarkerPolicy, StorageConfig, StorageType,
    Target,
};
pub use error::{Result, StoreError, TemplateError};
pub use factory::StorageFactory;
pub use in_kube::InKubeStore;
pub use metric::MetricStore;
pub use template::TemplateResolver;

/// Re-exports of the Kubernetes types used at the storage seam
pub mod k8s {
    pub use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
    pub use kube::Client;
    pub use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
    pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
}
