//! Error types for storage operations

use std::fmt;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Placeholder resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Scope is neither `SELF` nor `POD`
    #[error("unknown variable scope: {0}")]
    UnknownScope(String),

    /// Variable absent from the selected scope
    #[error("variable {name} not found in {scope} scope")]
    VariableNotFound {
        /// Scope that was searched
        scope: String,
        /// Variable name
        name: String,
    },

    /// The placeholder pattern failed to compile
    #[error("invalid placeholder pattern: {0}")]
    Pattern(String),
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No backend is registered for the tag
    #[error("Unknown storage type: {0}")]
    UnknownStorageType(String),

    /// Backend setup failed; the next resolution retries it
    #[error("Failed to set up {storage} storage: {message}")]
    StorageInitFailed {
        /// Storage type tag
        storage: String,
        /// Underlying failure
        message: String,
    },

    /// Backend used before setup
    #[error("Storage {0} is not initialized")]
    NotInitialized(String),

    /// Storage config failed validation
    #[error("Invalid storage config: {0}")]
    InvalidConfig(String),

    /// Placeholder resolution failed
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Metric value does not parse as a float
    #[error("Non-numeric metric data: {0:?}")]
    NonNumericData(String),

    /// Current pod identity or object is unavailable
    #[error("Current pod unavailable: {0}")]
    CurrentPod(String),

    /// Optimistic concurrency conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other cluster API failure
    #[error("Kubernetes API error: {0}")]
    Kube(String),

    /// Metric registry failure
    #[error("Metric error: {0}")]
    Metric(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Conflict retries ran out
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last error
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Create a new setup failure error
    pub fn init_failed(storage: impl fmt::Display, msg: impl fmt::Display) -> Self {
        Self::StorageInitFailed {
            storage: storage.to_string(),
            message: msg.to_string(),
        }
    }

    /// Create a new invalid config error
    pub fn invalid_config(msg: impl fmt::Display) -> Self {
        Self::InvalidConfig(msg.to_string())
    }

    /// Create a new cluster API error
    pub fn kube(msg: impl fmt::Display) -> Self {
        Self::Kube(msg.to_string())
    }

    /// Create a new metric error
    pub fn metric(msg: impl fmt::Display) -> Self {
        Self::Metric(msg.to_string())
    }

    /// Whether this is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<prometheus::Error> for StoreError {
    fn from(err: prometheus::Error) -> Self {
        StoreError::metric(err)
    }
}
