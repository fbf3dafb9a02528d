//! Plugin error types

use kidecar_config::BindError;
use kidecar_store::StoreError;
use std::fmt;

/// Plugin error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Raw config did not bind into the plugin's config type
    #[error("Config binding failed: {0}")]
    Bind(#[from] BindError),

    /// Initialization failed
    #[error("Initialization failed: {0}")]
    InitError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storing a result failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new initialization error
    pub fn init(msg: impl fmt::Display) -> Self {
        Self::InitError(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::ConfigError(msg.to_string())
    }

    /// Create a new runtime error
    pub fn runtime(msg: impl fmt::Display) -> Self {
        Self::RuntimeError(msg.to_string())
    }

    /// Create a new invalid state error
    pub fn invalid_state(msg: impl fmt::Display) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// Whether the error came from config binding
    pub fn is_bind(&self) -> bool {
        matches!(self, PluginError::Bind(_))
    }
}
