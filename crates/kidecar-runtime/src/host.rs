//! Sidecar plugin host

use crate::error::{HostError, Result};
use crate::registry::{PluginEntry, PluginRegistry};
use crate::server;
use kidecar_config::{HostSettings, SidecarConfig};
use kidecar_plugin_api::{
    Capabilities, DynPlugin, Plugin, PluginContext, PluginError, PluginFailure, PluginState,
    PluginStatus, TypedPlugin,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Runs the plugins configured for this sidecar
///
/// Plugins are registered with [`add_plugin`](SidecarHost::add_plugin), which
/// binds their configuration entry and calls `init`. [`start`](SidecarHost::start)
/// launches every plugin concurrently, polls their status in the background
/// and returns with the first error any plugin reports.
#[derive(Debug)]
pub struct SidecarHost {
    config: SidecarConfig,
    caps: Capabilities,
    registry: PluginRegistry,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    failures_tx: mpsc::UnboundedSender<PluginFailure>,
    failures_rx: Mutex<mpsc::UnboundedReceiver<PluginFailure>>,
}

impl SidecarHost {
    /// Create a host for `config`
    pub fn new(config: SidecarConfig, caps: Capabilities) -> Self {
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            config,
            caps,
            registry: PluginRegistry::new(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            failures_tx,
            failures_rx: Mutex::new(failures_rx),
        }
    }

    /// Load the sidecar configuration from `path` and create a host for it
    pub fn load<P: AsRef<Path>>(path: P, caps: Capabilities) -> Result<Self> {
        let config = kidecar_config::load(path)?;
        Ok(Self::new(config, caps))
    }

    /// Sidecar configuration
    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    /// Capabilities handed to plugins
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Host version
    pub fn version(&self) -> &'static str {
        crate::VERSION
    }

    /// Token that makes [`start`](SidecarHost::start) return when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register a typed plugin
    pub async fn register<P: Plugin>(&self, plugin: P) -> Result<()> {
        self.add_plugin(TypedPlugin::boxed(plugin)).await
    }

    /// Bind, initialize and register a plugin
    ///
    /// Plugins without a configuration entry are skipped. A plugin with the
    /// same name as a registered one replaces it.
    pub async fn add_plugin(&self, mut plugin: Box<dyn DynPlugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if name.is_empty() {
            return Err(HostError::EmptyName);
        }

        let Some(descriptor) = self.config.plugin(&name) else {
            info!(plugin = %name, "Plugin not configured, skipping");
            return Ok(());
        };

        plugin
            .bind_and_init(&descriptor.config, self.caps.clone())
            .await
            .map_err(|e| HostError::add_failed(&name, e))?;

        let version = plugin.version().to_string();
        let entry = PluginEntry::new(Arc::from(plugin), descriptor.boot_order, &self.shutdown);
        if self.registry.insert(&name, entry) {
            warn!(plugin = %name, version = %version, "Plugin replaced");
        } else {
            info!(plugin = %name, version = %version, "Plugin registered");
        }

        Ok(())
    }

    /// Names of registered plugins in boot order
    pub fn plugin_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Whether a plugin is registered under `name`
    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Lifecycle state of a registered plugin
    pub fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.registry.state(name)
    }

    /// Launch every registered plugin that is not already running
    ///
    /// Returns immediately with the number of plugins launched. Errors are
    /// delivered on the host's shared error channel.
    pub fn start_all(&self) -> usize {
        let mut launched = 0;
        for name in self.registry.names() {
            let Some((plugin, run)) = self.registry.begin_run(&name) else {
                continue;
            };
            let ctx = PluginContext::new(&name, run, self.failures_tx.clone());
            self.tracker
                .spawn(run_plugin(self.registry.clone(), name, plugin, ctx));
            launched += 1;
        }
        launched
    }

    /// Start one status poll task per registered plugin
    ///
    /// Consecutive tasks start `pollStagger` apart; each then polls every
    /// `pollInterval` until its plugin is removed or the host shuts down.
    /// A zero interval falls back to the default.
    pub fn start_polling(&self) {
        let mut interval = self.config.host.poll_interval;
        if interval.is_zero() {
            interval = HostSettings::default().poll_interval;
            warn!(interval = %humanize(interval), "pollInterval is zero, using default");
        }
        let stagger = self.config.host.poll_stagger;

        for (index, name) in self.registry.names().into_iter().enumerate() {
            let Some(entry) = self.registry.get(&name) else {
                continue;
            };
            let delay = stagger.saturating_mul(index as u32);
            self.tracker.spawn(poll_loop(
                self.registry.clone(),
                name,
                entry.plugin,
                entry.registration,
                delay,
                interval,
            ));
        }
    }

    /// Latest status of a plugin, polling it once if none is cached
    pub async fn plugin_status(&self, name: &str) -> Result<PluginStatus> {
        if let Some(status) = self.registry.cached_status(name) {
            return Ok(status);
        }
        self.poll_status(name).await
    }

    /// Poll a plugin's status now and cache the result
    pub async fn poll_status(&self, name: &str) -> Result<PluginStatus> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| HostError::not_found(name))?;

        let status = entry
            .plugin
            .status()
            .await
            .map_err(|source| HostError::StatusUnavailable {
                plugin: name.to_string(),
                source,
            })?;

        self.registry.store_status(name, &entry.plugin, status.clone());
        Ok(status)
    }

    /// Run the host until a plugin fails or the shutdown token is cancelled
    ///
    /// Launches all plugins, starts status polling and, when enabled, the
    /// liveness endpoint. The first plugin error ends the run and is
    /// returned; every other plugin task is cancelled on the way out.
    pub async fn start(&self) -> Result<()> {
        let mut failures = self.failures_rx.lock().await;

        let web = &self.config.host.web_server;
        if web.enabled {
            let listener = TcpListener::bind(web.listen).await?;
            let shutdown = self.shutdown.clone();
            self.tracker.spawn(async move {
                if let Err(e) = server::serve(listener, shutdown).await {
                    error!(error = %e, "Liveness endpoint failed");
                }
            });
        }

        let launched = self.start_all();
        self.start_polling();
        info!(
            plugins = launched,
            version = crate::VERSION,
            "Sidecar host started"
        );

        let result = tokio::select! {
            Some(failure) = failures.recv() => {
                error!(plugin = %failure.plugin, error = %failure.error, "Plugin failed, stopping host");
                Err(HostError::PluginFailed {
                    plugin: failure.plugin,
                    source: failure.error,
                })
            }
            _ = self.shutdown.cancelled() => {
                info!("Sidecar host shutting down");
                Ok(())
            }
        };

        self.shutdown.cancel();
        result
    }

    /// Stop and unregister a plugin
    ///
    /// The plugin stays registered if its `stop` fails.
    pub async fn remove_plugin(&self, name: &str) -> Result<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| HostError::not_found(name))?;

        self.stop_entry(name, &entry.plugin).await?;
        self.registry.remove(name);
        info!(plugin = %name, "Plugin removed");
        Ok(())
    }

    /// Stop every registered plugin in reverse boot order
    ///
    /// All plugins are attempted; failures are collected into
    /// [`HostError::StopAll`].
    pub async fn stop_all(&self) -> Result<()> {
        info!("Stopping all plugins");
        let mut failures = Vec::new();

        for name in self.registry.names().into_iter().rev() {
            let Some(entry) = self.registry.get(&name) else {
                continue;
            };
            if let Err(e) = self.stop_entry(&name, &entry.plugin).await {
                error!(plugin = %name, error = %e, "Plugin stop failed");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HostError::StopAll(failures))
        }
    }

    /// Cancel every host task and wait up to `stopTimeout` for them to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();

        let timeout = self.config.host.stop_timeout;
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                tasks = self.tracker.len(),
                "Host tasks still running after stop timeout"
            );
        }
    }

    async fn stop_entry(&self, name: &str, plugin: &Arc<dyn DynPlugin>) -> Result<()> {
        let timeout = self.config.host.stop_timeout;
        let outcome = tokio::time::timeout(timeout, plugin.stop()).await;

        let source = match outcome {
            Ok(Ok(())) => {
                self.registry.mark_stopped(name, plugin);
                info!(plugin = %name, "Plugin stopped");
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => PluginError::runtime(format!(
                "stop did not complete within {}",
                humanize(timeout)
            )),
        };

        Err(HostError::PluginStop {
            plugin: name.to_string(),
            source,
        })
    }
}

async fn run_plugin(
    registry: PluginRegistry,
    name: String,
    plugin: Arc<dyn DynPlugin>,
    ctx: PluginContext,
) {
    info!(plugin = %name, "Plugin starting");

    match plugin.start(ctx.clone()).await {
        Ok(()) => {
            registry.end_run(&name, &plugin, PluginState::Stopped);
            info!(plugin = %name, "Plugin exited");
        }
        Err(e) => {
            error!(plugin = %name, error = %e, "Plugin returned an error");
            registry.end_run(&name, &plugin, PluginState::Failed(e.to_string()));
            if !ctx.report(e) {
                debug!(plugin = %name, "Host no longer listening for plugin errors");
            }
        }
    }
}

async fn poll_loop(
    registry: PluginRegistry,
    name: String,
    plugin: Arc<dyn DynPlugin>,
    scope: CancellationToken,
    delay: Duration,
    interval: Duration,
) {
    tokio::select! {
        _ = scope.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            _ = ticker.tick() => {
                match plugin.status().await {
                    Ok(status) => {
                        debug!(plugin = %name, running = status.running, health = %status.health, "Polled plugin status");
                        registry.store_status(&name, &plugin, status);
                    }
                    Err(e) => warn!(plugin = %name, error = %e, "Status poll failed"),
                }
            }
        }
    }

    debug!(plugin = %name, "Status polling stopped");
}

fn humanize(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidecar_config::PluginDescriptor;
    use kidecar_plugin_api::testing::{test_capabilities, MockPlugin};
    use kidecar_store::PodIdentity;
    use serde_json::json;

    fn host(names: &[&str]) -> SidecarHost {
        let config = SidecarConfig {
            plugins: names
                .iter()
                .map(|name| PluginDescriptor::new(*name, json!({"label": *name})))
                .collect(),
            ..Default::default()
        };
        let (caps, _cluster) = test_capabilities(PodIdentity::new("default", "web-0"));
        SidecarHost::new(config, caps)
    }

    #[tokio::test]
    async fn test_unconfigured_plugin_is_skipped() {
        let host = host(&["alpha"]);
        host.register(MockPlugin::new("beta")).await.unwrap();
        assert!(!host.is_registered("beta"));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let host = host(&["alpha"]);
        let err = host.register(MockPlugin::new("")).await.unwrap_err();
        assert!(matches!(err, HostError::EmptyName));
    }

    #[tokio::test]
    async fn test_start_all_skips_running_plugins() {
        let host = host(&["alpha"]);
        let alpha = MockPlugin::new("alpha");
        host.register(alpha.clone()).await.unwrap();

        assert_eq!(host.start_all(), 1);
        assert_eq!(host.start_all(), 0);
        assert!(host.plugin_state("alpha").unwrap().is_running());

        host.shutdown().await;
        assert_eq!(alpha.start_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_uses_default() {
        let mut host = host(&["alpha"]);
        host.config.host.poll_interval = Duration::ZERO;
        let alpha = MockPlugin::new("alpha");
        host.register(alpha.clone()).await.unwrap();

        host.start_polling();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(alpha.status_call_count(), 1);

        tokio::time::sleep(HostSettings::default().poll_interval).await;
        assert_eq!(alpha.status_call_count(), 2);

        host.shutdown().await;
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize(Duration::from_secs(20)), "20s");
        assert_eq!(humanize(Duration::from_millis(1500)), "1500ms");
    }
}
