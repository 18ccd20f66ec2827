//! In-memory transport that records writes and injects inbound lines.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::{InboundLine, Transport, TransportError, INBOUND_BUFFER};

/// A payload accepted by [`MockTransport::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPayload {
    pub port: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct MockState {
    open_ports: HashSet<String>,
    refused_ports: HashSet<String>,
    writes: Vec<WrittenPayload>,
    failures_remaining: u32,
    open_count: usize,
    close_count: usize,
}

/// Recording transport.
///
/// Ports must be opened before they can be written. Failures can be
/// scripted with [`MockTransport::fail_next_writes`] and
/// [`MockTransport::refuse_port`]. Inbound lines are fed with
/// [`MockTransport::inject`] and the stream is ended with
/// [`MockTransport::end_inbound`].
pub struct MockTransport {
    state: Mutex<MockState>,
    inbound_tx: Mutex<Option<mpsc::Sender<InboundLine>>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundLine>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        Self {
            state: Mutex::new(MockState::default()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(Some(rx)),
        }
    }

    /// Makes the next `count` writes fail with a retryable I/O error.
    pub async fn fail_next_writes(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }

    /// Makes every `open` of `port` fail.
    pub async fn refuse_port(&self, port: impl Into<String>) {
        self.state.lock().await.refused_ports.insert(port.into());
    }

    /// Feeds an inbound line as if it arrived on `port`.
    ///
    /// Waits while the inbound channel is full. Returns false once the
    /// stream has ended or its consumer is gone.
    pub async fn inject(&self, port: impl Into<String>, line: impl Into<String>) -> bool {
        let Some(sender) = self.inbound_tx.lock().await.clone() else {
            return false;
        };
        sender.send(InboundLine::new(port, line)).await.is_ok()
    }

    /// Ends the inbound stream; the consumer sees it close after the lines
    /// already queued.
    pub async fn end_inbound(&self) {
        self.inbound_tx.lock().await.take();
    }

    /// All accepted writes, oldest first.
    pub async fn writes(&self) -> Vec<WrittenPayload> {
        self.state.lock().await.writes.clone()
    }

    /// Accepted writes for one port, oldest first.
    pub async fn writes_to(&self, port: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .writes
            .iter()
            .filter(|w| w.port == port)
            .map(|w| w.payload.clone())
            .collect()
    }

    pub async fn is_open(&self, port: &str) -> bool {
        self.state.lock().await.open_ports.contains(port)
    }

    /// Number of successful `open` and `close` calls.
    pub async fn lifecycle_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.open_count, state.close_count)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, port: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.refused_ports.contains(port) {
            return Err(TransportError::OpenFailed {
                port: port.to_string(),
                reason: "refused by mock".to_string(),
            });
        }
        state.open_ports.insert(port.to_string());
        state.open_count += 1;
        debug!(port, "Mock port opened");
        Ok(())
    }

    async fn close(&self, port: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.open_ports.remove(port) {
            state.close_count += 1;
            debug!(port, "Mock port closed");
        }
        Ok(())
    }

    async fn write(&self, port: &str, payload: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if !state.open_ports.contains(port) {
            return Err(TransportError::PortNotOpen(port.to_string()));
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(TransportError::Io("scripted failure".to_string()));
        }
        state.writes.push(WrittenPayload {
            port: port.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn take_inbound(&self) -> Option<mpsc::Receiver<InboundLine>> {
        self.inbound_rx.lock().await.take()
    }
}
