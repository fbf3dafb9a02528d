//! Testing utilities for plugin developers
//!
//! Enabled with the `testing` feature.

pub mod mocks;

pub use kidecar_store::testing::RecordingClusterClient;
pub use mocks::{MockConfig, MockPlugin};

use crate::capabilities::Capabilities;
use kidecar_store::{PodIdentity, StorageFactory, StoreContext};
use std::sync::Arc;

/// Capabilities backed by a [`RecordingClusterClient`] that knows `pod`
pub fn test_capabilities(pod: PodIdentity) -> (Capabilities, Arc<RecordingClusterClient>) {
    let cluster = Arc::new(RecordingClusterClient::new());
    cluster.add_pod(&pod, vec![]);
    let ctx = StoreContext::new(cluster.clone()).with_pod(pod);
    (
        Capabilities::new(Arc::new(StorageFactory::new(ctx))),
        cluster,
    )
}
