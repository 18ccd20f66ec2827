//! Typed signal values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a stored signal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Bool,
}

impl ValueType {
    /// Returns the lowercase type name used in messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value applied to a signal.
///
/// Tagged explicitly so a reader can never reinterpret an integer as a
/// float or a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SignalValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl SignalValue {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Bool,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
