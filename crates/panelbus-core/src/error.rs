//! Domain-specific error types following panic-free policy.

use crate::{Oid, ValueType};
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A panel listed the same signal twice
    #[error("Panel {panel} lists signal {signal} more than once")]
    DuplicateSignal { panel: String, signal: Oid },

    /// A panel with this name is already registered in the module
    #[error("Panel already registered in module {module}: {panel}")]
    DuplicatePanel { module: String, panel: String },

    /// Another panel in the module already addresses this signal
    #[error("Signal {signal} of panel {panel} is already claimed by panel {owner} in module {module}")]
    SignalAlreadyClaimed {
        module: String,
        panel: String,
        owner: String,
        signal: Oid,
    },

    /// Panels must be named
    #[error("Panel name must not be empty")]
    EmptyPanelName,

    /// A typed accessor did not match the stored value's type
    #[error("Signal {signal} holds a {actual} value, not {expected}")]
    WrongType {
        signal: Oid,
        expected: ValueType,
        actual: ValueType,
    },

    /// No value has been written for this signal yet
    #[error("Signal {0} has no value")]
    Unset(Oid),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
