//! Core plugin trait and types

use crate::capabilities::Capabilities;
use crate::context::PluginContext;
use crate::error::Result;
use crate::status::PluginStatus;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Core plugin trait that all plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug + 'static {
    /// Typed configuration the plugin's raw config entry is bound into
    type Config: DeserializeOwned + Send + 'static;

    /// Plugin name (must match the name in the sidecar configuration)
    fn name(&self) -> &str;

    /// Plugin version
    fn version(&self) -> &str;

    /// Initialize plugin with its bound configuration
    ///
    /// Called once, before the plugin is registered with the host.
    async fn init(&mut self, config: Self::Config, caps: Capabilities) -> Result<()>;

    /// Run the plugin's main loop
    ///
    /// Runs as its own task and should return once `ctx` is cancelled. An
    /// `Err` is forwarded to the host's error channel and is fatal to the host.
    async fn start(&self, ctx: PluginContext) -> Result<()>;

    /// Stop plugin (graceful shutdown)
    ///
    /// The host bounds each call with its `stopTimeout`; a call still
    /// pending after that counts as a failed stop. The run scope handed to
    /// `start` is cancelled separately on shutdown.
    async fn stop(&self) -> Result<()>;

    /// Report the plugin's current status
    async fn status(&self) -> Result<PluginStatus>;
}

/// Object-safe view of a [`Plugin`] used by the host
///
/// Wrap a plugin with [`TypedPlugin::boxed`] to obtain one.
#[async_trait]
pub trait DynPlugin: Send + Sync + fmt::Debug {
    /// Plugin name
    fn name(&self) -> &str;

    /// Plugin version
    fn version(&self) -> &str;

    /// Bind `raw` into the plugin's config type and initialize it
    ///
    /// Binding failures are reported as [`PluginError::Bind`](crate::PluginError::Bind).
    async fn bind_and_init(&mut self, raw: &Value, caps: Capabilities) -> Result<()>;

    /// See [`Plugin::start`]
    async fn start(&self, ctx: PluginContext) -> Result<()>;

    /// See [`Plugin::stop`]
    async fn stop(&self) -> Result<()>;

    /// See [`Plugin::status`]
    async fn status(&self) -> Result<PluginStatus>;
}

/// Adapter from a typed [`Plugin`] to [`DynPlugin`]
#[derive(Debug)]
pub struct TypedPlugin<P>(P);

impl<P: Plugin> TypedPlugin<P> {
    /// Wrap a plugin
    pub fn new(plugin: P) -> Self {
        Self(plugin)
    }

    /// Wrap a plugin and erase its type
    pub fn boxed(plugin: P) -> Box<dyn DynPlugin> {
        Box::new(Self(plugin))
    }

    /// Wrapped plugin
    pub fn inner(&self) -> &P {
        &self.0
    }
}

#[async_trait]
impl<P: Plugin> DynPlugin for TypedPlugin<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn version(&self) -> &str {
        self.0.version()
    }

    async fn bind_and_init(&mut self, raw: &Value, caps: Capabilities) -> Result<()> {
        let config: P::Config = kidecar_config::bind(raw)?;
        self.0.init(config, caps).await
    }

    async fn start(&self, ctx: PluginContext) -> Result<()> {
        self.0.start(ctx).await
    }

    async fn stop(&self) -> Result<()> {
        self.0.stop().await
    }

    async fn status(&self) -> Result<PluginStatus> {
        self.0.status().await
    }
}

/// Plugin lifecycle state as tracked by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginState {
    /// Config bound and init succeeded
    Bound,

    /// Main loop is running
    Running,

    /// Plugin was stopped
    Stopped,

    /// Main loop returned an error
    Failed(String),
}

impl PluginState {
    /// Check if the plugin is running
    pub fn is_running(&self) -> bool {
        matches!(self, PluginState::Running)
    }

    /// Check if the plugin is stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, PluginState::Stopped)
    }

    /// Check if the plugin has failed
    pub fn is_failed(&self) -> bool {
        matches!(self, PluginState::Failed(_))
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Bound => write!(f, "bound"),
            PluginState::Running => write!(f, "running"),
            PluginState::Stopped => write!(f, "stopped"),
            PluginState::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use kidecar_store::testing::RecordingClusterClient;
    use kidecar_store::{StorageFactory, StoreContext};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct CounterConfig {
        start_at: u32,
    }

    #[derive(Debug, Default)]
    struct CounterPlugin {
        value: u32,
    }

    #[async_trait]
    impl Plugin for CounterPlugin {
        type Config = CounterConfig;

        fn name(&self) -> &str {
            "counter"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn init(&mut self, config: CounterConfig, _caps: Capabilities) -> Result<()> {
            if config.start_at > 100 {
                return Err(PluginError::config("startAt must be at most 100"));
            }
            self.value = config.start_at;
            Ok(())
        }

        async fn start(&self, ctx: PluginContext) -> Result<()> {
            ctx.cancelled().await;
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        async fn status(&self) -> Result<PluginStatus> {
            Ok(PluginStatus::new(self.name(), self.version()).info(self.value.to_string()))
        }
    }

    fn caps() -> Capabilities {
        let ctx = StoreContext::new(Arc::new(RecordingClusterClient::new()));
        Capabilities::new(Arc::new(StorageFactory::new(ctx)))
    }

    #[tokio::test]
    async fn test_bind_and_init() {
        let mut plugin = TypedPlugin::new(CounterPlugin::default());
        plugin
            .bind_and_init(&json!({"startAt": 7}), caps())
            .await
            .unwrap();

        assert_eq!(plugin.inner().value, 7);
        let status = plugin.status().await.unwrap();
        assert_eq!(status.infos, vec!["7".to_string()]);
    }

    #[tokio::test]
    async fn test_bind_failure_is_distinguished() {
        let mut plugin = TypedPlugin::boxed(CounterPlugin::default());

        let err = plugin
            .bind_and_init(&json!({"startAt": "seven"}), caps())
            .await
            .unwrap_err();
        assert!(err.is_bind());

        let err = plugin
            .bind_and_init(&json!({"startAt": 500}), caps())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::ConfigError(_)));
    }

    #[test]
    fn test_plugin_state() {
        assert!(PluginState::Running.is_running());
        assert!(PluginState::Stopped.is_stopped());
        assert!(PluginState::Failed("error".to_string()).is_failed());
        assert_eq!(PluginState::Bound.to_string(), "bound");
        assert_eq!(
            PluginState::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }
}
