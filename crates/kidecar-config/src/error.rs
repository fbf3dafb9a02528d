//! Configuration and binding error types

use std::fmt;

/// Error raised while loading or validating the sidecar configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be parsed
    #[error("Failed to parse {format}: {message}")]
    Parse {
        /// Format that was being parsed
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// The file extension is not a known format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A referenced environment variable is unset and has no default
    #[error("Environment variable '{0}' not set and no default provided")]
    MissingEnvVar(String),

    /// The document parsed but failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Error raised while binding a dynamic config fragment into a typed value
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The source fragment is not a string-keyed mapping
    #[error("config source must be a mapping, got {0}")]
    InvalidSource(&'static str),

    /// The target type is not a structured record
    #[error("config target must be a structured record, got {0}")]
    InvalidTarget(&'static str),

    /// Re-encoding the source fragment failed
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),

    /// The fragment does not match the target shape
    #[error("failed to decode config: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Create a new parse error
    pub fn parse(format: &'static str, msg: impl fmt::Display) -> Self {
        Self::Parse {
            format,
            message: msg.to_string(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format(ext: impl fmt::Display) -> Self {
        Self::UnsupportedFormat(ext.to_string())
    }

    /// Create a new validation error
    pub fn invalid(msg: impl fmt::Display) -> Self {
        Self::Invalid(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::parse("YAML", "unexpected end of stream");
        assert_eq!(
            err.to_string(),
            "Failed to parse YAML: unexpected end of stream"
        );

        let err = BindError::InvalidSource("array");
        assert_eq!(err.to_string(), "config source must be a mapping, got array");
    }
}
