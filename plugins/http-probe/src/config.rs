//! Probe configuration

use kidecar_store::StorageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default delay before the first probe
pub const DEFAULT_START_DELAY_SECONDS: u64 = 30;

/// Default pause between probes of one endpoint
pub const DEFAULT_PROBE_INTERVAL_SECONDS: u64 = 5;

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProbeConfig {
    /// Seconds to wait before probing starts
    #[serde(default = "default_start_delay")]
    pub start_delay_seconds: u64,

    /// Seconds between probes of the same endpoint
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,

    /// Endpoints to probe
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            start_delay_seconds: DEFAULT_START_DELAY_SECONDS,
            probe_interval_seconds: DEFAULT_PROBE_INTERVAL_SECONDS,
            endpoints: Vec::new(),
        }
    }
}

impl HttpProbeConfig {
    /// Delay before probing starts
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_seconds)
    }

    /// Pause between probes; zero falls back to the default
    pub fn probe_interval(&self) -> Duration {
        match self.probe_interval_seconds {
            0 => Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECONDS),
            secs => Duration::from_secs(secs),
        }
    }
}

fn default_start_delay() -> u64 {
    DEFAULT_START_DELAY_SECONDS
}

fn default_probe_interval() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECONDS
}

/// One endpoint to probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Target URL
    pub url: String,

    /// HTTP method; empty means GET
    #[serde(default)]
    pub method: String,

    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request timeout in seconds; zero means the default
    #[serde(default)]
    pub timeout: u64,

    /// Status code a healthy endpoint answers with; zero means 200
    #[serde(default)]
    pub expected_status_code: u16,

    /// Where the probe result goes
    pub storage_config: StorageConfig,

    /// Extract a field from a JSON body instead of storing the whole body
    #[serde(default)]
    pub json_path_config: Option<JsonPathConfig>,
}

impl EndpointConfig {
    /// Request method, defaulting to GET
    pub fn method(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        match self.timeout {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Expected status code
    pub fn expected_status(&self) -> u16 {
        match self.expected_status_code {
            0 => 200,
            code => code,
        }
    }
}

/// Field to extract from a JSON response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPathConfig {
    /// Dotted path, e.g. `status.players.0.name`
    pub json_path: String,

    /// Type the extracted value is converted to
    #[serde(default)]
    pub field_type: Option<FieldType>,
}

/// Conversion applied to an extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Stringify the value
    String,
    /// Integer
    Int,
    /// Floating point number
    Float,
}
