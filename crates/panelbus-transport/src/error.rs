//! Transport errors.

use thiserror::Error;

/// Errors returned by [`crate::Transport`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The port was never opened or has been closed.
    #[error("port not open: {0}")]
    PortNotOpen(String),

    /// The port could not be opened.
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// The transport refused the payload (busy, buffer full, ...).
    #[error("write to {port} rejected: {reason}")]
    Rejected { port: String, reason: String },

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Whether retrying the same write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Rejected { .. })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
