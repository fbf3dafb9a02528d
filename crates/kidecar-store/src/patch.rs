//! Patch document construction
//!
//! The current pod is patched with a strategic merge document, other objects
//! with an RFC 6902 JSON Patch whose paths are RFC 6901 pointers.

use crate::config::InKubeConfig;
use crate::error::Result;
use serde_json::{json, Map, Value};

/// Escape one RFC 6901 reference token
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Turn a configured json path into a pointer
///
/// Values starting with `/` are taken as pointers already. Dotted paths
/// (`status.result`, `.status.result` or `$.status.result`) are split on `.`
/// and each segment escaped.
pub fn json_path_to_pointer(path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    path.trim_start_matches('$')
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| format!("/{}", escape_pointer_segment(s)))
        .collect()
}

/// Labels and annotations to write on the current pod for `data`
///
/// The configured keys receive `data`; the active marker policy is overlaid
/// on top. Returns `None` when there is nothing to write.
pub fn pod_metadata_patch(data: &str, config: &InKubeConfig) -> Option<Value> {
    let mut annotations = Map::new();
    let mut labels = Map::new();

    if let Some(key) = config.annotation_key() {
        annotations.insert(key.to_string(), Value::from(data));
    }
    if let Some(key) = config.label_key() {
        labels.insert(key.to_string(), Value::from(data));
    }
    if let Some(policy) = config.policy_for_state(data) {
        for (key, value) in &policy.annotations {
            annotations.insert(key.clone(), Value::from(value.as_str()));
        }
        for (key, value) in &policy.labels {
            labels.insert(key.clone(), Value::from(value.as_str()));
        }
    }

    if annotations.is_empty() && labels.is_empty() {
        return None;
    }

    let mut metadata = Map::new();
    if !annotations.is_empty() {
        metadata.insert("annotations".to_string(), Value::Object(annotations));
    }
    if !labels.is_empty() {
        metadata.insert("labels".to_string(), Value::Object(labels));
    }

    Some(json!({ "metadata": metadata }))
}

/// JSON Patch operations to apply on the target object for `data`
///
/// Order: annotation key, label key, json path, then policy annotations and
/// policy labels in key order.
pub fn target_patch_operations(data: &str, config: &InKubeConfig) -> Vec<Value> {
    let mut ops = Vec::new();

    if let Some(key) = config.annotation_key() {
        ops.push(replace_op(annotation_path(key), data));
    }
    if let Some(key) = config.label_key() {
        ops.push(replace_op(label_path(key), data));
    }
    if let Some(path) = config.json_path() {
        ops.push(replace_op(json_path_to_pointer(path), data));
    }
    if let Some(policy) = config.policy_for_state(data) {
        for (key, value) in &policy.annotations {
            ops.push(replace_op(annotation_path(key), value));
        }
        for (key, value) in &policy.labels {
            ops.push(replace_op(label_path(key), value));
        }
    }

    ops
}

/// Typed JSON Patch for the target object
pub fn target_json_patch(data: &str, config: &InKubeConfig) -> Result<json_patch::Patch> {
    let ops = target_patch_operations(data, config);
    Ok(serde_json::from_value(Value::Array(ops))?)
}

fn annotation_path(key: &str) -> String {
    format!("/metadata/annotations/{}", escape_pointer_segment(key))
}

fn label_path(key: &str) -> String {
    format!("/metadata/labels/{}", escape_pointer_segment(key))
}

fn replace_op(path: String, value: &str) -> Value {
    json!({ "op": "replace", "path": path, "value": value })
}
