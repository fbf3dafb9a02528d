//! Storage configuration

use crate::error::{Result, StoreError};
use crate::factory::StorageFactory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Storage backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    /// Pod and arbitrary object patching
    #[serde(rename = "InKube")]
    InKube,
    /// Prometheus gauge export
    #[serde(rename = "HTTPMetric")]
    HttpMetric,
}

impl StorageType {
    /// All storage kinds
    pub const ALL: [StorageType; 2] = [StorageType::InKube, StorageType::HttpMetric];

    /// Wire tag of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::InKube => "InKube",
            StorageType::HttpMetric => "HTTPMetric",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        StorageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::UnknownStorageType(s.to_string()))
    }
}

/// Where and how a plugin result is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Patch the current pod and optionally another object
    #[serde(rename = "InKube")]
    InKube {
        /// Patch settings
        #[serde(rename = "inKube")]
        in_kube: InKubeConfig,
    },
    /// Export as a gauge
    #[serde(rename = "HTTPMetric")]
    HttpMetric {
        /// Metric settings
        #[serde(rename = "httpMetric")]
        http_metric: HttpMetricConfig,
    },
}

impl StorageConfig {
    /// Backend kind this config routes to
    pub fn storage_type(&self) -> StorageType {
        match self {
            StorageConfig::InKube { .. } => StorageType::InKube,
            StorageConfig::HttpMetric { .. } => StorageType::HttpMetric,
        }
    }

    /// Resolve the backend through `factory` and store `data` with it
    pub async fn store_data(&self, factory: &StorageFactory, data: &serde_json::Value) -> Result<()> {
        let storage = factory.get_storage(self.storage_type()).await?;
        storage.store(&stringify_data(data), self).await
    }
}

/// Render a dynamic value the way it is written into labels, annotations and gauges
///
/// Strings are kept as-is; other values use their compact JSON form.
pub fn stringify_data(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// InKube storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InKubeConfig {
    /// Another object to patch besides the current pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// JSON pointer (or dotted path) written on the target object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,

    /// Annotation key that receives the data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_key: Option<String>,

    /// Label key that receives the data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_key: Option<String>,

    /// State-keyed label/annotation overrides, first match wins
    #[serde(default, alias = "markerPolices", skip_serializing_if = "Vec::is_empty")]
    pub marker_policies: Vec<MarkerPolicy>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl InKubeConfig {
    /// Configured annotation key, if non-empty
    pub fn annotation_key(&self) -> Option<&str> {
        non_empty(&self.annotation_key)
    }

    /// Configured label key, if non-empty
    pub fn label_key(&self) -> Option<&str> {
        non_empty(&self.label_key)
    }

    /// Configured json path, if non-empty
    pub fn json_path(&self) -> Option<&str> {
        non_empty(&self.json_path)
    }

    /// Check that the config writes somewhere and the target is addressable
    pub fn validate(&self) -> Result<()> {
        if self.annotation_key().is_none()
            && self.label_key().is_none()
            && self.json_path().is_none()
            && self.marker_policies.is_empty()
        {
            return Err(StoreError::invalid_config(
                "one of jsonPath, annotationKey, labelKey or markerPolicies must be set",
            ));
        }

        if let Some(target) = &self.target {
            target.validate()?;
        }

        Ok(())
    }

    /// The first policy whose state equals `state`
    pub fn policy_for_state(&self, state: &str) -> Option<&MarkerPolicy> {
        self.marker_policies.iter().find(|p| p.state == state)
    }
}

/// Resource coordinate of an object to patch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// API group, empty for the core group
    #[serde(default)]
    pub group: String,

    /// API version
    #[serde(default)]
    pub version: String,

    /// Plural resource name
    #[serde(default)]
    pub resource: String,

    /// Namespace, may hold a placeholder
    #[serde(default)]
    pub namespace: String,

    /// Object name, may hold a placeholder
    #[serde(default)]
    pub name: String,

    /// The object owns the current pod; an empty namespace means the pod's namespace
    #[serde(default)]
    pub is_pod_owner: bool,
}

impl Target {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("version", &self.version),
            ("resource", &self.resource),
            ("name", &self.name),
        ] {
            if value.is_empty() {
                return Err(StoreError::invalid_config(format!(
                    "target {field} cannot be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Label/annotation overrides applied when the data equals `state`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPolicy {
    /// Literal state matched against the stringified data
    pub state: String,

    /// Labels to set
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Annotations to set
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// HTTPMetric storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMetricConfig {
    /// Gauge name
    pub metric_name: String,
}

impl HttpMetricConfig {
    /// Check the metric name is set
    pub fn validate(&self) -> Result<()> {
        if self.metric_name.is_empty() {
            return Err(StoreError::invalid_config("metricName cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_type_tags() {
        assert_eq!("InKube".parse::<StorageType>().unwrap(), StorageType::InKube);
        assert_eq!(
            "HTTPMetric".parse::<StorageType>().unwrap(),
            StorageType::HttpMetric
        );
        assert!(matches!(
            "ConfigMap".parse::<StorageType>(),
            Err(StoreError::UnknownStorageType(ref t)) if t == "ConfigMap"
        ));
    }

    #[test]
    fn test_deserialize_in_kube() {
        let config: StorageConfig = serde_json::from_value(json!({
            "type": "InKube",
            "inKube": {
                "annotationKey": "probe-result",
                "target": {"version": "v1", "resource": "widgets", "name": "w1", "namespace": "${POD:NS}"},
                "markerPolicies": [{"state": "Failed", "annotations": {"tier": "degraded"}}]
            }
        }))
        .unwrap();

        assert_eq!(config.storage_type(), StorageType::InKube);
        let StorageConfig::InKube { in_kube } = config else {
            panic!("expected InKube");
        };
        assert_eq!(in_kube.annotation_key(), Some("probe-result"));
        assert_eq!(in_kube.target.as_ref().unwrap().namespace, "${POD:NS}");
        assert_eq!(in_kube.marker_policies[0].annotations["tier"], "degraded");
    }

    #[test]
    fn test_marker_polices_alias() {
        let config: InKubeConfig = serde_json::from_value(json!({
            "markerPolices": [{"state": "Healthy", "labels": {"ready": "true"}}]
        }))
        .unwrap();
        assert_eq!(config.marker_policies.len(), 1);
    }

    #[test]
    fn test_deserialize_http_metric() {
        let config: StorageConfig = serde_json::from_value(json!({
            "type": "HTTPMetric",
            "httpMetric": {"metricName": "probe_latency"}
        }))
        .unwrap();
        assert_eq!(config.storage_type(), StorageType::HttpMetric);

        let unknown = serde_json::from_value::<StorageConfig>(json!({"type": "Redis"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_validate_requires_destination() {
        assert!(InKubeConfig::default().validate().is_err());

        let config = InKubeConfig {
            annotation_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = InKubeConfig {
            label_key: Some("state".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_target() {
        let config = InKubeConfig {
            annotation_key: Some("k".into()),
            target: Some(Target {
                version: "v1".into(),
                resource: "widgets".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target name"));
    }

    #[test]
    fn test_policy_first_match_wins() {
        let config = InKubeConfig {
            marker_policies: vec![
                MarkerPolicy {
                    state: "Failed".into(),
                    labels: BTreeMap::from([("tier".into(), "first".into())]),
                    ..Default::default()
                },
                MarkerPolicy {
                    state: "Failed".into(),
                    labels: BTreeMap::from([("tier".into(), "second".into())]),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(config.policy_for_state("Failed").unwrap().labels["tier"], "first");
        assert!(config.policy_for_state("Healthy").is_none());
    }

    #[test]
    fn test_stringify_data() {
        assert_eq!(stringify_data(&json!("Healthy")), "Healthy");
        assert_eq!(stringify_data(&json!(3.5)), "3.5");
        assert_eq!(stringify_data(&json!(true)), "true");
        assert_eq!(stringify_data(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
