//! Host error types

use kidecar_config::ConfigError;
use kidecar_plugin_api::PluginError;
use std::fmt;

/// Plugin host error type
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Plugin reported an empty name
    #[error("Plugin name must not be empty")]
    EmptyName,

    /// Raw config did not bind into the plugin's config type
    #[error("Failed to bind config for plugin {plugin}: {source}")]
    ConfigBind {
        /// Plugin name
        plugin: String,
        /// Binding failure
        #[source]
        source: PluginError,
    },

    /// Plugin init returned an error
    #[error("Failed to initialize plugin {plugin}: {source}")]
    PluginInit {
        /// Plugin name
        plugin: String,
        /// Init failure
        #[source]
        source: PluginError,
    },

    /// Plugin not registered
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// Plugin could not report its status
    #[error("Status unavailable for plugin {plugin}: {source}")]
    StatusUnavailable {
        /// Plugin name
        plugin: String,
        /// Status failure
        #[source]
        source: PluginError,
    },

    /// Plugin stop failed or timed out
    #[error("Failed to stop plugin {plugin}: {source}")]
    PluginStop {
        /// Plugin name
        plugin: String,
        /// Stop failure
        #[source]
        source: PluginError,
    },

    /// One or more plugins failed to stop
    #[error("Failed to stop {} plugin(s): {}", .0.len(), join_errors(.0))]
    StopAll(Vec<HostError>),

    /// A running plugin reported a fatal error
    #[error("Plugin {plugin} failed: {source}")]
    PluginFailed {
        /// Plugin name
        plugin: String,
        /// Runtime failure
        #[source]
        source: PluginError,
    },

    /// Liveness server failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Sidecar configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    /// Create a new plugin not found error
    pub fn not_found(name: impl fmt::Display) -> Self {
        Self::PluginNotFound(name.to_string())
    }

    /// Wrap a failed `add_plugin` step, separating bind from init failures
    pub fn add_failed(plugin: impl Into<String>, source: PluginError) -> Self {
        let plugin = plugin.into();
        if source.is_bind() {
            Self::ConfigBind { plugin, source }
        } else {
            Self::PluginInit { plugin, source }
        }
    }

    /// Name of the plugin this error concerns, if any
    pub fn plugin(&self) -> Option<&str> {
        match self {
            HostError::ConfigBind { plugin, .. }
            | HostError::PluginInit { plugin, .. }
            | HostError::StatusUnavailable { plugin, .. }
            | HostError::PluginStop { plugin, .. }
            | HostError::PluginFailed { plugin, .. } => Some(plugin),
            HostError::PluginNotFound(name) => Some(name),
            _ => None,
        }
    }
}

fn join_errors(errors: &[HostError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidecar_config::BindError;

    #[test]
    fn test_add_failed_classification() {
        let err = HostError::add_failed("probe", PluginError::from(BindError::InvalidSource("array")));
        assert!(matches!(err, HostError::ConfigBind { .. }));

        let err = HostError::add_failed("probe", PluginError::init("no endpoints"));
        assert!(matches!(err, HostError::PluginInit { .. }));
        assert_eq!(err.plugin(), Some("probe"));
    }

    #[test]
    fn test_error_display() {
        let err = HostError::not_found("probe");
        assert_eq!(err.to_string(), "Plugin not found: probe");

        let err = HostError::StopAll(vec![
            HostError::PluginStop {
                plugin: "a".to_string(),
                source: PluginError::runtime("busy"),
            },
            HostError::not_found("b"),
        ]);
        assert_eq!(
            err.to_string(),
            "Failed to stop 2 plugin(s): Failed to stop plugin a: Runtime error: busy; Plugin not found: b"
        );
    }
}
