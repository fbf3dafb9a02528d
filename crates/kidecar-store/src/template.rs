//! Placeholder resolution for storage target identities
//!
//! A value may carry one placeholder of the form `${SCOPE:NAME}`:
//!
//! - `${SELF:NAME}` reads `NAME` from the sidecar process environment
//! - `${POD:NAME}` reads `NAME` from the env list of the pod's primary container
//!
//! A matching value resolves to the variable's value. Values without a
//! placeholder are returned unchanged.

use crate::error::TemplateError;
use k8s_openapi::api::core::v1::Container;
use regex::Regex;
use std::env;

/// Scope naming the sidecar's own environment
pub const SCOPE_SELF: &str = "SELF";

/// Scope naming the primary container's environment
pub const SCOPE_POD: &str = "POD";

const PLACEHOLDER_PATTERN: &str = r"\$\{([^:}]+):([^}]+)\}";

/// Resolves `${SELF:NAME}` / `${POD:NAME}` placeholders
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    pattern: Regex,
}

impl TemplateResolver {
    /// Create a new resolver
    pub fn new() -> Result<Self, TemplateError> {
        let pattern =
            Regex::new(PLACEHOLDER_PATTERN).map_err(|e| TemplateError::Pattern(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Whether `value` carries a placeholder
    pub fn has_placeholder(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    /// Resolve the first placeholder in `value`
    ///
    /// `container` is the `POD` scope; a missing container behaves like one
    /// with no env vars.
    pub fn resolve(
        &self,
        value: &str,
        container: Option<&Container>,
    ) -> Result<String, TemplateError> {
        let Some(caps) = self.pattern.captures(value) else {
            return Ok(value.to_string());
        };
        let scope = caps.get(1).map_or("", |m| m.as_str());
        let name = caps.get(2).map_or("", |m| m.as_str());

        let resolved = match scope {
            SCOPE_SELF => env::var(name).ok(),
            SCOPE_POD => container
                .and_then(|c| c.env.as_ref())
                .and_then(|vars| vars.iter().find(|v| v.name == name))
                .map(|v| v.value.clone().unwrap_or_default()),
            other => return Err(TemplateError::UnknownScope(other.to_string())),
        };

        resolved.ok_or_else(|| TemplateError::VariableNotFound {
            scope: scope.to_string(),
            name: name.to_string(),
        })
    }
}
