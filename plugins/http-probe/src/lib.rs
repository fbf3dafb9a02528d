//! # HTTP Probe Plugin
//!
//! Periodically requests a set of HTTP endpoints and stores what they return.
//!
//! Each endpoint is probed on its own task. A probe checks the response
//! status, optionally extracts one field from a JSON body and hands the
//! value to the endpoint's storage config: pod labels and annotations, a
//! patch on another object, or a Prometheus gauge.
//!
//! ## Example
//!
//! ```yaml
//! plugins:
//!   - name: http_probe
//!     config:
//!       startDelaySeconds: 10
//!       probeIntervalSeconds: 5
//!       endpoints:
//!         - url: http://localhost:8080/status
//!           expectedStatusCode: 200
//!           jsonPathConfig:
//!             jsonPath: status.state
//!           storageConfig:
//!             type: InKube
//!             inKube:
//!               annotationKey: game.example.com/state
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod config;
pub mod error;
pub mod executor;
pub mod extract;

pub use config::{EndpointConfig, FieldType, HttpProbeConfig, JsonPathConfig};
pub use error::ProbeError;
pub use executor::ProbeExecutor;

use kidecar_plugin_api::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Plugin name
pub const PLUGIN_NAME: &str = "http_probe";

/// Plugin version
pub const PLUGIN_VERSION: &str = "v0.0.1";

const HEALTH_RUNNING: &str = "Running";
const HEALTH_STOPPED: &str = "Stopped";

#[derive(Debug, Default)]
struct ProbeState {
    health: String,
    active_probes: usize,
    successes: u64,
    failures: u64,
    last_error: Option<String>,
}

/// Probes HTTP endpoints and stores the results
#[derive(Debug, Default)]
pub struct HttpProbePlugin {
    config: HttpProbeConfig,
    executor: Option<ProbeExecutor>,
    state: Arc<Mutex<ProbeState>>,
    stop: Mutex<CancellationToken>,
}

impl HttpProbePlugin {
    /// Create a new plugin
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration in effect
    pub fn config(&self) -> &HttpProbeConfig {
        &self.config
    }

    fn set_health(&self, health: &str) {
        self.state.lock().health = health.to_string();
    }
}

#[async_trait]
impl Plugin for HttpProbePlugin {
    type Config = HttpProbeConfig;

    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        PLUGIN_VERSION
    }

    async fn init(&mut self, config: HttpProbeConfig, caps: Capabilities) -> Result<(), PluginError> {
        for endpoint in &config.endpoints {
            if endpoint.url.is_empty() {
                return Err(PluginError::config("endpoint url cannot be empty"));
            }
        }

        info!(
            plugin = PLUGIN_NAME,
            endpoints = config.endpoints.len(),
            interval = ?config.probe_interval(),
            "Initialized"
        );
        self.config = config;
        self.executor = Some(ProbeExecutor::new(caps));
        Ok(())
    }

    async fn start(&self, ctx: PluginContext) -> Result<(), PluginError> {
        let executor = self
            .executor
            .clone()
            .ok_or_else(|| PluginError::invalid_state("start called before init"))?;

        let scope = ctx.cancellation_token().child_token();
        *self.stop.lock() = scope.clone();

        let delay = self.config.start_delay();
        if !delay.is_zero() {
            info!(plugin = PLUGIN_NAME, delay = ?delay, "Delaying start");
            tokio::select! {
                _ = scope.cancelled() => {
                    self.set_health(HEALTH_STOPPED);
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.config.endpoints.is_empty() {
            info!(plugin = PLUGIN_NAME, "No endpoints to probe");
            self.set_health(HEALTH_STOPPED);
            return Ok(());
        }

        info!(plugin = PLUGIN_NAME, "Starting probes");
        self.set_health(HEALTH_RUNNING);

        let interval = self.config.probe_interval();
        let mut probes = JoinSet::new();
        for endpoint in self.config.endpoints.iter().cloned() {
            probes.spawn(probe_loop(
                executor.clone(),
                endpoint,
                interval,
                self.state.clone(),
                scope.clone(),
            ));
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                error!(plugin = PLUGIN_NAME, error = %e, "Probe task aborted");
            }
        }

        self.set_health(HEALTH_STOPPED);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.stop.lock().cancel();
        self.set_health(HEALTH_STOPPED);
        Ok(())
    }

    async fn status(&self) -> Result<PluginStatus, PluginError> {
        let state = self.state.lock();
        let mut status = PluginStatus::new(PLUGIN_NAME, PLUGIN_VERSION)
            .running(state.health == HEALTH_RUNNING)
            .health(state.health.clone())
            .info(format!("active probes: {}", state.active_probes))
            .info(format!(
                "probes succeeded: {}, failed: {}",
                state.successes, state.failures
            ));
        if let Some(err) = &state.last_error {
            status = status.info(format!("last error: {err}"));
        }
        Ok(status)
    }
}

async fn probe_loop(
    executor: ProbeExecutor,
    endpoint: EndpointConfig,
    interval: std::time::Duration,
    state: Arc<Mutex<ProbeState>>,
    scope: CancellationToken,
) {
    state.lock().active_probes += 1;

    loop {
        let result = tokio::select! {
            _ = scope.cancelled() => break,
            result = executor.probe_with_retry(&endpoint) => result,
        };

        match result {
            Ok(()) => {
                debug!(endpoint = %endpoint.url, "Probed successfully");
                state.lock().successes += 1;
            }
            Err(e) => {
                error!(endpoint = %endpoint.url, error = %e, "Failed to probe");
                let mut state = state.lock();
                state.failures += 1;
                state.last_error = Some(e.to_string());
            }
        }

        tokio::select! {
            _ = scope.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!(endpoint = %endpoint.url, "Probe stopped");
    state.lock().active_probes -= 1;
}
