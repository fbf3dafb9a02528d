//! Configuration validation

use crate::error::{ConfigError, Result};
use crate::SidecarConfig;
use std::collections::HashSet;

/// Validate configuration
pub fn validate_config(config: &SidecarConfig) -> Result<()> {
    validate_plugins(config)?;
    validate_host(config)?;

    Ok(())
}

fn validate_plugins(config: &SidecarConfig) -> Result<()> {
    let mut seen = HashSet::new();

    for plugin in &config.plugins {
        if plugin.name.is_empty() {
            return Err(ConfigError::invalid("plugin name cannot be empty"));
        }

        if !seen.insert(plugin.name.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Duplicate plugin name: {}",
                plugin.name
            )));
        }

        if !plugin.config.is_object() {
            return Err(ConfigError::invalid(format!(
                "Plugin {} config must be a mapping",
                plugin.name
            )));
        }
    }

    if config.plugins.is_empty() {
        tracing::warn!("No plugins configured");
    }

    Ok(())
}

fn validate_host(config: &SidecarConfig) -> Result<()> {
    if config.host.poll_interval.is_zero() {
        return Err(ConfigError::invalid("host pollInterval must be > 0"));
    }

    if config.host.web_server.enabled
        && config.host.web_server.listen == config.host.metrics_listen
    {
        return Err(ConfigError::invalid(format!(
            "webServer listen address {} collides with metricsListen",
            config.host.web_server.listen
        )));
    }

    Ok(())
}
