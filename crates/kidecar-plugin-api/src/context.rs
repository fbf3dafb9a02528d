//! Execution context for a running plugin

use crate::error::PluginError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Error raised by a plugin while running
#[derive(Debug)]
pub struct PluginFailure {
    /// Name of the failing plugin
    pub plugin: String,

    /// What went wrong
    pub error: PluginError,
}

/// Scope handed to [`Plugin::start`](crate::Plugin::start)
///
/// Carries the cancellation signal for the plugin's tasks and the host's
/// shared error channel. Clones share both.
#[derive(Debug, Clone)]
pub struct PluginContext {
    plugin: String,
    cancel: CancellationToken,
    failures: mpsc::UnboundedSender<PluginFailure>,
}

impl PluginContext {
    /// Create a new plugin context
    pub fn new(
        plugin: impl Into<String>,
        cancel: CancellationToken,
        failures: mpsc::UnboundedSender<PluginFailure>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            cancel,
            failures,
        }
    }

    /// Name of the plugin this context belongs to
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Token cancelled when the host shuts the plugin down
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until the plugin is asked to stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Whether the plugin was asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report a fatal error from a background task
    ///
    /// Returns `false` if the host is no longer listening.
    pub fn report(&self, error: PluginError) -> bool {
        self.failures
            .send(PluginFailure {
                plugin: self.plugin.clone(),
                error,
            })
            .is_ok()
    }
}
