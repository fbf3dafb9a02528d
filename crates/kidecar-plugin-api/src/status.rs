//! Plugin status reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time status of one plugin
///
/// The host keeps the latest report per plugin and replaces it wholesale on
/// every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatus {
    /// Plugin name
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Whether the plugin's main loop is running
    pub running: bool,

    /// When the status was produced
    pub last_checked: DateTime<Utc>,

    /// Free-form health summary
    #[serde(default)]
    pub health: String,

    /// Additional human-readable details
    #[serde(default)]
    pub infos: Vec<String>,
}

impl PluginStatus {
    /// Create a status stamped with the current time
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            running: false,
            last_checked: Utc::now(),
            health: String::new(),
            infos: Vec::new(),
        }
    }

    /// Set the running flag
    pub fn running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// Set the health summary
    pub fn health(mut self, health: impl Into<String>) -> Self {
        self.health = health.into();
        self
    }

    /// Append a detail line
    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.infos.push(info.into());
        self
    }
}
