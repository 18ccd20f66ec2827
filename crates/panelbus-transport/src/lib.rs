//! panelbus Transport - capability interface for panel ports
//!
//! The dispatcher never talks to a serial port directly. It hands encoded
//! payloads to a [`Transport`] and, in the event-driven setup, consumes
//! the transport's inbound line stream. Real transports (serial, TCP) and the
//! in-memory [`MockTransport`] plug in without changing the dispatcher.
//!
//! - `error` - Transport error type
//! - `line` - Line-oriented transport over any async reader/writer (stdio)
//! - `mock` - Recording transport for tests and dry runs
//! - `retry` - Bounded exponential backoff for writes

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod error;
pub mod line;
pub mod mock;
pub mod retry;

pub use error::TransportError;
pub use line::{LineTransport, StdioTransport};
pub use mock::{MockTransport, WrittenPayload};
pub use retry::{write_with_retry, RetryExhausted, RetryPolicy};

/// Capacity of the inbound line channel. A full channel pauses the reader.
pub const INBOUND_BUFFER: usize = 256;

/// A raw line received on a logical port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLine {
    pub port: String,
    pub line: String,
}

impl InboundLine {
    pub fn new(port: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            line: line.into(),
        }
    }
}

/// Capability for writing payloads to logical ports.
///
/// Writes are fire-and-forget from the device's point of view: success means
/// the transport accepted the payload, not that the device acknowledged it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Opens a logical port so it can be written to.
    async fn open(&self, port: &str) -> Result<(), TransportError>;

    /// Closes a logical port. Closing a port that is not open is a no-op.
    async fn close(&self, port: &str) -> Result<(), TransportError>;

    /// Writes one encoded payload to a port.
    async fn write(&self, port: &str, payload: &str) -> Result<(), TransportError>;

    /// Takes the inbound line stream, if this transport produces one.
    ///
    /// There is a single consumer: the first call gets the receiver, later
    /// calls get `None`. The stream ends once the input source is exhausted.
    async fn take_inbound(&self) -> Option<mpsc::Receiver<InboundLine>> {
        None
    }
}
