//! Value extraction from probe responses

use crate::config::{FieldType, JsonPathConfig};
use crate::error::ProbeError;
use kidecar_store::stringify_data;
use serde_json::Value;

/// Turn a response body into the value to store
///
/// Without a path config the body is stored as text.
pub fn extract_data(body: &[u8], path: Option<&JsonPathConfig>) -> Result<Value, ProbeError> {
    let Some(path) = path else {
        return Ok(Value::String(String::from_utf8_lossy(body).into_owned()));
    };

    let document: Value =
        serde_json::from_slice(body).map_err(|e| ProbeError::extract(format!("invalid json: {e}")))?;
    let value = lookup(&document, &path.json_path)
        .ok_or_else(|| ProbeError::extract(format!("path not found: {}", path.json_path)))?;

    match path.field_type {
        None => Ok(value.clone()),
        Some(field_type) => convert(value, field_type),
    }
}

/// Follow a dotted path; numeric segments index into arrays
///
/// An optional leading `$.` is ignored, so `$.a.b` and `a.b` are the same path.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(document);
    }

    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn convert(value: &Value, field_type: FieldType) -> Result<Value, ProbeError> {
    let text = stringify_data(value);
    match field_type {
        FieldType::String => Ok(Value::String(text)),
        FieldType::Int => {
            if let Some(i) = value.as_i64() {
                return Ok(Value::from(i));
            }
            text.trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| ProbeError::extract(format!("{text:?} is not an integer")))
        }
        FieldType::Float => {
            if let Some(f) = value.as_f64() {
                return Ok(Value::from(f));
            }
            text.trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| ProbeError::extract(format!("{text:?} is not a number")))
        }
    }
}
