//! Value Module
//!
//! Tagged value type stored by the cache, plus the built-in decoders used
//! for typed retrieval.

use std::fmt;

use serde_json::Number;

use crate::error::{CacheError, Result};

// == Value ==
/// A stored value. Every entry holds exactly one of these kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
    Integer(i64),
    Float(f64),
}

impl Value {
    /// Short name of the value kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
        }
    }

    /// Raw byte form of the value, the way a byte-oriented store would hold it.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Text(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Integer(i) => i.to_string().into_bytes(),
            Value::Float(f) => f.to_string().into_bytes(),
        }
    }

    // == JSON Conversion ==
    /// Builds a value from JSON.
    ///
    /// Strings, integers and floats map to their kinds; an array of numbers
    /// in `0..=255` maps to bytes. Anything else is rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(CacheError::Validation(format!(
                        "Number {} is out of range",
                        n
                    )))
                }
            }
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| {
                            CacheError::Validation(
                                "Byte arrays may only contain integers 0-255".to_string(),
                            )
                        })
                })
                .collect::<Result<Vec<u8>>>()
                .map(Value::Bytes),
            other => Err(CacheError::Validation(format!(
                "Unsupported value type: {}",
                json_type_name(&other)
            ))),
        }
    }

    /// JSON form of the value, the inverse of [`Value::from_json`].
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            Value::Integer(i) => serde_json::Value::from(*i),
            // Non-finite floats have no JSON number form
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Object(_) => "object",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Array(_) => "array",
    }
}

// == Conversions ==
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

// == Decoders ==
/// Built-in decoders for [`crate::Engine::retrieve_as`].
///
/// Each one reads the value through its byte form where needed, so an
/// integer stored as text (`"42"`) decodes as an integer, while `"abc"` fails.
pub mod decode {
    use super::Value;
    use crate::error::DecodeError;

    /// Decodes the value as UTF-8 text.
    pub fn text(value: Value) -> Result<String, DecodeError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|e| DecodeError::new("bytes", "text", e.to_string()))
            }
            other => Ok(other.to_string()),
        }
    }

    /// Decodes the value as a signed integer.
    pub fn integer(value: Value) -> Result<i64, DecodeError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => {
                let kind = other.kind();
                let raw = text(other).map_err(|e| DecodeError::new(kind, "integer", e.reason))?;
                raw.trim()
                    .parse::<i64>()
                    .map_err(|e| DecodeError::new(kind, "integer", e.to_string()))
            }
        }
    }

    /// Decodes the value as a float. Integers widen losslessly where possible.
    pub fn float(value: Value) -> Result<f64, DecodeError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => {
                let kind = other.kind();
                let raw = text(other).map_err(|e| DecodeError::new(kind, "float", e.reason))?;
                raw.trim()
                    .parse::<f64>()
                    .map_err(|e| DecodeError::new(kind, "float", e.to_string()))
            }
        }
    }

    /// Returns the raw byte form. Never fails.
    pub fn bytes(value: Value) -> Result<Vec<u8>, DecodeError> {
        Ok(match value {
            Value::Bytes(b) => b,
            other => other.to_bytes(),
        })
    }
}
