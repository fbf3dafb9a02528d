//! Configuration types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Root sidecar configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidecarConfig {
    /// Plugin descriptors, in document order
    #[serde(default, deserialize_with = "deserialize_plugins")]
    pub plugins: Vec<PluginDescriptor>,

    /// Restart policy (advisory, never consulted by the host)
    #[serde(default)]
    pub restart_policy: RestartPolicy,

    /// Resource hints for the sidecar container
    #[serde(default)]
    pub resources: BTreeMap<String, String>,

    /// Whether the sidecar starts before or after the main container
    #[serde(default)]
    pub sidecar_start_order: SidecarStartOrder,

    /// Host runtime settings
    #[serde(default)]
    pub host: HostSettings,
}

impl SidecarConfig {
    /// Look up a plugin descriptor by name
    pub fn plugin(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Names of all configured plugins
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.name.as_str())
    }
}

/// Declarative configuration for one plugin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// Plugin name, unique within the document
    #[serde(default)]
    pub name: String,

    /// Boot order hint
    #[serde(default)]
    pub boot_order: i32,

    /// Opaque plugin-specific configuration
    #[serde(default = "empty_object", deserialize_with = "null_as_empty_object")]
    pub config: serde_json::Value,
}

impl PluginDescriptor {
    /// Create a descriptor with the given raw config
    pub fn new(name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            boot_order: 0,
            config,
        }
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn null_as_empty_object<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => empty_object(),
        Some(v) => v,
    })
}

/// Plugins may be written as a list of descriptors or as a map keyed by name
#[derive(Deserialize)]
#[serde(untagged)]
enum PluginsRepr {
    List(Vec<PluginDescriptor>),
    Map(BTreeMap<String, PluginDescriptor>),
}

fn deserialize_plugins<'de, D>(deserializer: D) -> Result<Vec<PluginDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<PluginsRepr>::deserialize(deserializer)?;
    Ok(match repr {
        None => Vec::new(),
        Some(PluginsRepr::List(list)) => list,
        Some(PluginsRepr::Map(map)) => map
            .into_iter()
            .map(|(key, mut descriptor)| {
                if descriptor.name.is_empty() {
                    descriptor.name = key;
                }
                descriptor
            })
            .collect(),
    })
}

/// Sidecar restart policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RestartPolicy {
    /// Always restart
    #[default]
    Always,
    /// Restart on failure only
    OnFailure,
    /// Never restart
    Never,
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Always" => Ok(RestartPolicy::Always),
            "OnFailure" => Ok(RestartPolicy::OnFailure),
            "Never" => Ok(RestartPolicy::Never),
            other => Err(format!(
                "unknown restart policy '{other}' (expected Always, OnFailure or Never)"
            )),
        }
    }
}

impl TryFrom<String> for RestartPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RestartPolicy> for String {
    fn from(policy: RestartPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Always => write!(f, "Always"),
            RestartPolicy::OnFailure => write!(f, "OnFailure"),
            RestartPolicy::Never => write!(f, "Never"),
        }
    }
}

/// Start order of the sidecar relative to the main container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SidecarStartOrder {
    /// Start before the main container
    Before,
    /// Start after the main container
    #[default]
    After,
}

impl FromStr for SidecarStartOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "before" => Ok(SidecarStartOrder::Before),
            "" | "after" => Ok(SidecarStartOrder::After),
            _ => Err(format!(
                "unknown sidecar start order '{s}' (expected Before or After)"
            )),
        }
    }
}

impl TryFrom<String> for SidecarStartOrder {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SidecarStartOrder> for String {
    fn from(order: SidecarStartOrder) -> Self {
        match order {
            SidecarStartOrder::Before => "Before".to_string(),
            SidecarStartOrder::After => "After".to_string(),
        }
    }
}

/// Settings for the plugin host itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostSettings {
    /// Interval between status polls of one plugin
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Delay between launching consecutive poll tasks
    #[serde(default = "default_poll_stagger", with = "humantime_serde")]
    pub poll_stagger: Duration,

    /// Upper bound on host shutdown
    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Liveness web server
    #[serde(default)]
    pub web_server: WebServerConfig,

    /// Listen address of the metric storage endpoint
    #[serde(default = "default_metrics_listen")]
    pub metrics_listen: SocketAddr,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_stagger: default_poll_stagger(),
            stop_timeout: default_stop_timeout(),
            web_server: WebServerConfig::default(),
            metrics_listen: default_metrics_listen(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_stagger() -> Duration {
    Duration::from_secs(1)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

/// Liveness web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebServerConfig {
    /// Whether the liveness endpoint is served
    #[serde(default)]
    pub enabled: bool,

    /// Listen address
    #[serde(default = "default_web_listen")]
    pub listen: SocketAddr,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_web_listen(),
        }
    }
}

fn default_web_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
