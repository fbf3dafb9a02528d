//! Plugin config binding
//!
//! Converts the opaque `config` fragment of a [`PluginDescriptor`](crate::PluginDescriptor)
//! into the typed configuration a plugin declares. The fragment is re-encoded
//! to JSON and decoded into the target, so any field type mismatch surfaces
//! here rather than when the plugin runs.

use crate::error::BindError;
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde_json::Value;
use std::fmt;

/// Bind a dynamic config fragment into `T`
///
/// Fails with [`BindError::InvalidSource`] when `source` is not a mapping and
/// with [`BindError::InvalidTarget`] when `T` does not deserialize from a
/// structured record (a struct or map).
pub fn bind<T: DeserializeOwned>(source: &Value) -> Result<T, BindError> {
    let Value::Object(map) = source else {
        return Err(BindError::InvalidSource(kind_of(source)));
    };

    if !accepts_record::<T>() {
        return Err(BindError::InvalidTarget(std::any::type_name::<T>()));
    }

    let encoded = serde_json::to_vec(map).map_err(BindError::Encode)?;
    serde_json::from_slice(&encoded).map_err(BindError::Decode)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Ask `T` which shape it wants without feeding it any data
fn accepts_record<T: DeserializeOwned>() -> bool {
    match T::deserialize(ShapeProbe) {
        Ok(_) => true,
        Err(ProbeError::Scalar) => false,
        Err(ProbeError::Record) => true,
    }
}

#[derive(Debug)]
enum ProbeError {
    Record,
    Scalar,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Record => write!(f, "record"),
            ProbeError::Scalar => write!(f, "scalar"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl de::Error for ProbeError {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        ProbeError::Record
    }
}

struct ShapeProbe;

macro_rules! reject_scalar {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ProbeError> {
                Err(ProbeError::Scalar)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ShapeProbe {
    type Error = ProbeError;

    // Self-describing targets (untagged or internally tagged enums) cannot be
    // told apart here and are let through to the real decode.
    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Record)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Record)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Scalar)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ProbeError> {
        Err(ProbeError::Scalar)
    }

    reject_scalar! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_seq
    }

    serde::forward_to_deserialize_any! {
        option unit unit_struct newtype_struct map enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct ProbeConfig {
        #[serde(default = "default_delay")]
        start_delay_seconds: u64,
        endpoints: Vec<Endpoint>,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Endpoint {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    }

    fn default_delay() -> u64 {
        30
    }

    #[test]
    fn test_bind_struct() {
        let source = json!({
            "startDelaySeconds": 5,
            "endpoints": [{"url": "http://localhost/healthz"}]
        });

        let config: ProbeConfig = bind(&source).unwrap();
        assert_eq!(config.start_delay_seconds, 5);
        assert_eq!(config.endpoints[0].url, "http://localhost/healthz");
    }

    #[test]
    fn test_bind_applies_defaults() {
        let config: ProbeConfig = bind(&json!({"endpoints": []})).unwrap();
        assert_eq!(config.start_delay_seconds, 30);
    }

    #[test]
    fn test_bind_roundtrip_preserves_fields() {
        let source = json!({
            "startDelaySeconds": 12,
            "endpoints": [{"url": "http://a", "headers": {"X-Probe": "1"}}]
        });

        let config: ProbeConfig = bind(&source).unwrap();
        assert_eq!(serde_json::to_value(&config).unwrap(), source);
    }

    #[test]
    fn test_bind_invalid_source() {
        let err = bind::<ProbeConfig>(&json!(["not", "a", "map"])).unwrap_err();
        assert!(matches!(err, BindError::InvalidSource("array")));

        let err = bind::<ProbeConfig>(&Value::Null).unwrap_err();
        assert!(matches!(err, BindError::InvalidSource("null")));
    }

    #[test]
    fn test_bind_invalid_target() {
        let err = bind::<String>(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, BindError::InvalidTarget(_)));

        let err = bind::<Vec<u32>>(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, BindError::InvalidTarget(_)));
    }

    #[test]
    fn test_bind_map_target() {
        let map: HashMap<String, i64> = bind(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(map["b"], 2);
    }

    #[test]
    fn test_bind_type_mismatch() {
        let err = bind::<ProbeConfig>(&json!({"startDelaySeconds": "soon", "endpoints": []}))
            .unwrap_err();
        assert!(matches!(err, BindError::Decode(_)));
    }
}
