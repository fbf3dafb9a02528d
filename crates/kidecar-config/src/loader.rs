//! Configuration loading

use crate::error::{ConfigError, Result};
use crate::{ConfigFormat, SidecarConfig};
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

/// Load configuration from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SidecarConfig> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)?;
    let format = ConfigFormat::from_path(path)?;

    load_from_str(&content, format)
}

/// Expand environment variables in configuration string
///
/// Supports `${VAR}` and `${VAR:-default}`. Scoped placeholders such as
/// `${POD:NAME}` do not match and are left for the storage layer.
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| ConfigError::invalid(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => return Err(ConfigError::MissingEnvVar(var_name.to_string())),
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<SidecarConfig> {
    let expanded_content = expand_env_vars(content)?;

    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded_content)
            .map_err(|e| ConfigError::parse("YAML", e))?,
        ConfigFormat::Toml => {
            toml::from_str(&expanded_content).map_err(|e| ConfigError::parse("TOML", e))?
        }
        ConfigFormat::Json => serde_json::from_str(&expanded_content)
            .map_err(|e| ConfigError::parse("JSON", e))?,
    };

    Ok(config)
}

/// Load a configuration file and validate it
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SidecarConfig> {
    let path = path.as_ref();
    let config = load_from_file(path)?;

    crate::validator::validate_config(&config)?;

    tracing::debug!(
        path = %path.display(),
        plugins = config.plugins.len(),
        "Sidecar configuration loaded"
    );

    Ok(config)
}
