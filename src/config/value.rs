//! Primitive configuration values

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::config::error::ConfigError;

/// Flat key-value mapping produced by layering
pub type Values = BTreeMap<String, PrimitiveValue>;

/// A configuration value: string, boolean or number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Bool(bool),
    Number(Number),
    String(String),
}

impl PrimitiveValue {
    /// Convert a template value, rejecting anything that is not primitive.
    ///
    /// `key` is only used to name the offending entry in the error.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(s) => Ok(PrimitiveValue::String(s.clone())),
            Value::Bool(b) => Ok(PrimitiveValue::Bool(*b)),
            Value::Number(n) => Ok(PrimitiveValue::Number(n.clone())),
            other => Err(ConfigError::UnsupportedValueType {
                key: key.to_string(),
                type_name: json_type_name(other),
            }),
        }
    }

    /// Build a number value from a float; `None` for NaN and infinities
    pub fn from_f64(value: f64) -> Option<Self> {
        Number::from_f64(value).map(PrimitiveValue::Number)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrimitiveValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimitiveValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrimitiveValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// The JSON type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveValue::Bool(_) => "boolean",
            PrimitiveValue::Number(_) => "number",
            PrimitiveValue::String(_) => "string",
        }
    }
}

/// JSON type name used in error messages
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Bool(b) => write!(f, "{}", b),
            PrimitiveValue::Number(n) => write!(f, "{}", n),
            PrimitiveValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        PrimitiveValue::String(value.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        PrimitiveValue::String(value)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(value: bool) -> Self {
        PrimitiveValue::Bool(value)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(value: i64) -> Self {
        PrimitiveValue::Number(value.into())
    }
}

impl From<i32> for PrimitiveValue {
    fn from(value: i32) -> Self {
        PrimitiveValue::Number(value.into())
    }
}

impl From<u64> for PrimitiveValue {
    fn from(value: u64) -> Self {
        PrimitiveValue::Number(value.into())
    }
}

impl From<PrimitiveValue> for Value {
    fn from(value: PrimitiveValue) -> Self {
        match value {
            PrimitiveValue::Bool(b) => Value::Bool(b),
            PrimitiveValue::Number(n) => Value::Number(n),
            PrimitiveValue::String(s) => Value::String(s),
        }
    }
}
