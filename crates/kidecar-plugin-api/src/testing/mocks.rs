//! Mock implementations for testing

use crate::capabilities::Capabilities;
use crate::context::PluginContext;
use crate::plugin::Plugin;
use crate::status::PluginStatus;
use crate::PluginError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Config accepted by [`MockPlugin`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Arbitrary label echoed in the status infos
    pub label: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    configs: Vec<MockConfig>,
    start_calls: usize,
    stop_calls: usize,
    status_calls: usize,
    running: bool,
    fail_init: Option<String>,
    fail_start: Option<(Duration, String)>,
    fail_stop: Option<String>,
    stop_delay: Option<Duration>,
    fail_status: Option<String>,
}

/// Mock plugin for testing
///
/// Clones share their call counters, so a test can keep one clone while the
/// host owns another.
#[derive(Debug, Clone)]
pub struct MockPlugin {
    name: String,
    version: String,
    state: Arc<Mutex<MockState>>,
}

impl MockPlugin {
    /// Create a new mock plugin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Make `init` fail with `msg`
    pub fn failing_init(self, msg: impl Into<String>) -> Self {
        self.state.lock().fail_init = Some(msg.into());
        self
    }

    /// Make `start` fail with `msg` after `delay`
    pub fn failing_start(self, delay: Duration, msg: impl Into<String>) -> Self {
        self.state.lock().fail_start = Some((delay, msg.into()));
        self
    }

    /// Make `stop` fail with `msg`
    pub fn failing_stop(self, msg: impl Into<String>) -> Self {
        self.state.lock().fail_stop = Some(msg.into());
        self
    }

    /// Make `stop` take `delay` before returning
    pub fn slow_stop(self, delay: Duration) -> Self {
        self.state.lock().stop_delay = Some(delay);
        self
    }

    /// Make `status` fail with `msg`
    pub fn failing_status(self, msg: impl Into<String>) -> Self {
        self.state.lock().fail_status = Some(msg.into());
        self
    }

    /// Configs passed to `init`
    pub fn init_configs(&self) -> Vec<MockConfig> {
        self.state.lock().configs.clone()
    }

    /// Get number of successful init calls
    pub fn init_call_count(&self) -> usize {
        self.state.lock().configs.len()
    }

    /// Get number of start calls
    pub fn start_call_count(&self) -> usize {
        self.state.lock().start_calls
    }

    /// Get number of stop calls
    pub fn stop_call_count(&self) -> usize {
        self.state.lock().stop_calls
    }

    /// Get number of status calls
    pub fn status_call_count(&self) -> usize {
        self.state.lock().status_calls
    }

    /// Whether `start` is currently running
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    type Config = MockConfig;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn init(&mut self, config: MockConfig, _caps: Capabilities) -> Result<(), PluginError> {
        let mut state = self.state.lock();
        if let Some(msg) = &state.fail_init {
            return Err(PluginError::init(msg));
        }
        state.configs.push(config);
        Ok(())
    }

    async fn start(&self, ctx: PluginContext) -> Result<(), PluginError> {
        let failure = {
            let mut state = self.state.lock();
            state.start_calls += 1;
            state.running = true;
            state.fail_start.clone()
        };

        let result = match failure {
            Some((delay, msg)) => {
                tokio::time::sleep(delay).await;
                Err(PluginError::runtime(msg))
            }
            None => {
                ctx.cancelled().await;
                Ok(())
            }
        };

        self.state.lock().running = false;
        result
    }

    async fn stop(&self) -> Result<(), PluginError> {
        let delay = {
            let mut state = self.state.lock();
            state.stop_calls += 1;
            state.stop_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(msg) = &state.fail_stop {
            return Err(PluginError::runtime(msg));
        }
        state.running = false;
        Ok(())
    }

    async fn status(&self) -> Result<PluginStatus, PluginError> {
        let mut state = self.state.lock();
        state.status_calls += 1;
        if let Some(msg) = &state.fail_status {
            return Err(PluginError::runtime(msg));
        }

        let mut status = PluginStatus::new(&self.name, &self.version)
            .running(state.running)
            .health(if state.running { "Running" } else { "Stopped" });
        if let Some(label) = state.configs.last().and_then(|c| c.label.clone()) {
            status = status.info(label);
        }
        Ok(status)
    }
}
