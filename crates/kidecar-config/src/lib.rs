//! # Kidecar Configuration
//!
//! Declarative sidecar configuration with support for:
//! - Multiple formats (YAML, TOML, JSON)
//! - Environment variable expansion (`${VAR}` and `${VAR:-default}`)
//! - Validation of plugin descriptors and lifecycle tags
//! - Binding of per-plugin config fragments into typed values

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod binder;
pub mod error;
pub mod loader;
pub mod types;
pub mod validator;

pub use binder::bind;
pub use error::{BindError, ConfigError, Result};
pub use loader::{load_config, load_from_file, load_from_str};
pub use types::{
    HostSettings, PluginDescriptor, RestartPolicy, SidecarConfig, SidecarStartOrder,
    WebServerConfig,
};
pub use validator::validate_config;

use std::path::Path;

/// Load and validate a sidecar configuration file
pub fn load<P: AsRef<Path>>(path: P) -> Result<SidecarConfig> {
    load_config(path)
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::unsupported_format(path.display()))?;

        match ext {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(ConfigError::unsupported_format(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("/opt/kidecar/config.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("config.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("config.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("config.json")).unwrap(),
            ConfigFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigFormat::from_path(&PathBuf::from("config.txt"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));

        let result = ConfigFormat::from_path(&PathBuf::from("config"));
        assert!(result.is_err());
    }
}
