//! Tokenizing received lines and coercing values per type tag.

use std::fmt;
use std::str::FromStr;

use panelbus_core::{SignalValue, ValueType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the three fields of a line.
pub const FIELD_SEPARATOR: char = ' ';

/// Number of fields in a well-formed line.
pub const FIELD_COUNT: usize = 3;

// ============================================================================
// Parse Errors
// ============================================================================

/// Errors produced while tokenizing a line or coercing its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line did not split into exactly three fields.
    #[error("expected 3 space-separated fields, found {found}")]
    FieldCount { found: usize },

    /// The type tag is not one of `I`, `F`, `B`.
    #[error("unknown type tag: {0:?}")]
    UnknownType(String),

    /// The value is not a valid literal for its type tag.
    #[error("invalid {tag} value {value:?}: {reason}")]
    InvalidValue {
        tag: TypeTag,
        value: String,
        reason: String,
    },
}

// ============================================================================
// Type Tags
// ============================================================================

/// Type tag carried in the second field of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    #[serde(rename = "I")]
    Int,
    #[serde(rename = "F")]
    Float,
    #[serde(rename = "B")]
    Bool,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "I",
            Self::Float => "F",
            Self::Bool => "B",
        }
    }

    /// Returns the value type this tag coerces into.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int => ValueType::Int,
            Self::Float => ValueType::Float,
            Self::Bool => ValueType::Bool,
        }
    }

    /// Coerces a raw literal into a typed value.
    ///
    /// - `I`: signed 64-bit integer
    /// - `F`: finite 64-bit float
    /// - `B`: `true` / `false`, case-insensitive
    ///
    /// # Errors
    /// `ParseError::InvalidValue` when the literal does not parse.
    pub fn coerce(&self, raw: &str) -> Result<SignalValue, ParseError> {
        let invalid = |reason: String| ParseError::InvalidValue {
            tag: *self,
            value: raw.to_string(),
            reason,
        };

        match self {
            Self::Int => raw
                .parse::<i64>()
                .map(SignalValue::Int)
                .map_err(|e| invalid(e.to_string())),
            Self::Float => {
                let value = raw.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                if !value.is_finite() {
                    return Err(invalid("value is not finite".to_string()));
                }
                Ok(SignalValue::Float(value))
            }
            Self::Bool => parse_bool(raw)
                .map(SignalValue::Bool)
                .ok_or_else(|| invalid("expected true or false".to_string())),
        }
    }
}

impl FromStr for TypeTag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(Self::Int),
            "F" => Ok(Self::Float),
            "B" => Ok(Self::Bool),
            other => Err(ParseError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// ============================================================================
// Parsed Message
// ============================================================================

/// A tokenized line: `(link, type_tag, raw_value)`.
///
/// Only the field count is validated here. The type tag stays a raw string
/// until [`ParsedMessage::type_tag`] is asked for it, so signal resolution
/// can run before tag validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    link: String,
    type_tag: String,
    raw_value: String,
}

impl ParsedMessage {
    /// Splits a line on single spaces into exactly three fields.
    ///
    /// Consecutive spaces produce empty fields and therefore a field-count
    /// error.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut fields = line.split(FIELD_SEPARATOR);
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(link), Some(type_tag), Some(raw_value), None) => Ok(Self {
                link: link.to_string(),
                type_tag: type_tag.to_string(),
                raw_value: raw_value.to_string(),
            }),
            _ => Err(ParseError::FieldCount {
                found: line.split(FIELD_SEPARATOR).count(),
            }),
        }
    }

    pub fn new(
        link: impl Into<String>,
        type_tag: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        Self {
            link: link.into(),
            type_tag: type_tag.into(),
            raw_value: raw_value.into(),
        }
    }

    /// The signal reference (first field).
    pub fn link(&self) -> &str {
        &self.link
    }

    /// The raw type tag (second field).
    pub fn raw_type_tag(&self) -> &str {
        &self.type_tag
    }

    /// The raw value literal (third field).
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// Interprets the type tag.
    pub fn type_tag(&self) -> Result<TypeTag, ParseError> {
        self.type_tag.parse()
    }

    /// Interprets the type tag and coerces the value.
    pub fn value(&self) -> Result<SignalValue, ParseError> {
        self.type_tag()?.coerce(&self.raw_value)
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.link, self.type_tag, self.raw_value)
    }
}
