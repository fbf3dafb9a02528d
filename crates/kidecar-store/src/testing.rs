//! In-memory cluster double for tests

use crate::cluster::{ClusterClient, ObjectRef, PodIdentity};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Recorded {
    pods: HashMap<PodIdentity, Pod>,
    pod_patches: Vec<(PodIdentity, Value)>,
    object_patches: Vec<(ObjectRef, Value)>,
    get_pod_calls: usize,
    conflicts_remaining: u32,
    fail_get_pod: bool,
}

/// `kube` client whose requests never leave the process
///
/// Every call is answered with an empty `404 Not Found`.
pub fn offline_kube_client(default_namespace: &str) -> kube::Client {
    let service = tower::service_fn(|_request: http::Request<kube::client::Body>| async {
        let mut response = http::Response::new(kube::client::Body::empty());
        *response.status_mut() = http::StatusCode::NOT_FOUND;
        Ok::<_, std::convert::Infallible>(response)
    });
    kube::Client::new(service, default_namespace)
}

/// [`ClusterClient`] that records every patch instead of sending it
#[derive(Debug, Default)]
pub struct RecordingClusterClient {
    state: Mutex<Recorded>,
}

impl RecordingClusterClient {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod whose first container carries `env`
    pub fn add_pod(&self, identity: &PodIdentity, env: Vec<(&str, &str)>) {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(identity.name.clone()),
                namespace: Some(identity.namespace.clone()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "main".to_string(),
                    env: Some(
                        env.into_iter()
                            .map(|(name, value)| EnvVar {
                                name: name.to_string(),
                                value: Some(value.to_string()),
                                ..Default::default()
                            })
                            .collect(),
                    ),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        self.state.lock().pods.insert(identity.clone(), pod);
    }

    /// Make `get_pod` fail until switched back
    pub fn set_fail_get_pod(&self, fail: bool) {
        self.state.lock().fail_get_pod = fail;
    }

    /// Answer the next `count` patches with a conflict
    pub fn conflict_next(&self, count: u32) {
        self.state.lock().conflicts_remaining = count;
    }

    /// Strategic merge patches applied to pods
    pub fn pod_patches(&self) -> Vec<(PodIdentity, Value)> {
        self.state.lock().pod_patches.clone()
    }

    /// JSON Patches applied to other objects
    pub fn object_patches(&self) -> Vec<(ObjectRef, Value)> {
        self.state.lock().object_patches.clone()
    }

    /// Number of `get_pod` calls
    pub fn get_pod_calls(&self) -> usize {
        self.state.lock().get_pod_calls
    }

    fn take_conflict(state: &mut Recorded) -> Result<()> {
        if state.conflicts_remaining > 0 {
            state.conflicts_remaining -= 1;
            return Err(StoreError::Conflict(
                "the object has been modified".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for RecordingClusterClient {
    async fn get_pod(&self, pod: &PodIdentity) -> Result<Pod> {
        let mut state = self.state.lock();
        state.get_pod_calls += 1;
        if state.fail_get_pod {
            return Err(StoreError::kube("connection refused"));
        }
        state
            .pods
            .get(pod)
            .cloned()
            .ok_or_else(|| StoreError::kube(format!("pods \"{}\" not found", pod.name)))
    }

    async fn patch_pod(&self, pod: &PodIdentity, patch: &Value) -> Result<()> {
        let mut state = self.state.lock();
        Self::take_conflict(&mut state)?;
        state.pod_patches.push((pod.clone(), patch.clone()));
        Ok(())
    }

    async fn patch_object(&self, target: &ObjectRef, patch: &json_patch::Patch) -> Result<()> {
        let mut state = self.state.lock();
        Self::take_conflict(&mut state)?;
        state
            .object_patches
            .push((target.clone(), serde_json::to_value(patch)?));
        Ok(())
    }
}
