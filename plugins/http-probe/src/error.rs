//! Probe errors

use kidecar_store::StoreError;
use std::fmt;
use std::time::Duration;

/// Why a single probe failed
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure
    #[error("request failed: {0}")]
    Request(String),

    /// No response within the endpoint timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Endpoint answered with the wrong status
    #[error("unexpected status code: got {got}, expected {expected}, body: {body}")]
    UnexpectedStatus {
        /// Received status
        got: u16,
        /// Expected status
        expected: u16,
        /// Response body
        body: String,
    },

    /// Value could not be extracted from the body
    #[error("failed to extract data: {0}")]
    Extract(String),

    /// Result could not be stored
    #[error("failed to store data: {0}")]
    Store(#[from] StoreError),
}

impl ProbeError {
    /// Create a new extraction error
    pub fn extract(msg: impl fmt::Display) -> Self {
        Self::Extract(msg.to_string())
    }
}
