//! Diagnostic reporting capability.
//!
//! The dispatcher and runtime never log dispatch events directly; they hand
//! a [`ReportEvent`] to an injected [`Reporter`]. Reporting is a side
//! channel only and never influences control flow.

use std::sync::Mutex;

use panelbus_core::{Oid, SignalValue};
use tracing::{debug, info, warn};

use crate::dispatch::DispatchError;

/// A notable event in the dispatch pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    /// A raw line reached a panel's dispatcher.
    Received {
        panel: String,
        source: String,
        line: String,
    },

    /// The line was empty or repeated the last applied line.
    Suppressed { panel: String, line: String },

    /// The line failed validation; state is unchanged.
    Rejected {
        panel: String,
        line: String,
        error: DispatchError,
    },

    /// A value was written to the state store.
    Applied {
        panel: String,
        signal: Oid,
        value: SignalValue,
    },

    /// The encoded payload was accepted by the transport.
    Forwarded {
        panel: String,
        port: String,
        payload: String,
        attempts: u32,
    },

    /// The payload could not be forwarded.
    ForwardFailed {
        panel: String,
        port: String,
        error: String,
    },

    /// An inbound line had nowhere to go.
    Dropped {
        port: String,
        line: String,
        reason: String,
    },
}

impl ReportEvent {
    /// Name of the panel the event concerns, if any.
    pub fn panel(&self) -> Option<&str> {
        match self {
            Self::Received { panel, .. }
            | Self::Suppressed { panel, .. }
            | Self::Rejected { panel, .. }
            | Self::Applied { panel, .. }
            | Self::Forwarded { panel, .. }
            | Self::ForwardFailed { panel, .. } => Some(panel.as_str()),
            Self::Dropped { .. } => None,
        }
    }
}

/// Sink for dispatch diagnostics.
pub trait Reporter: Send + Sync {
    fn report(&self, event: ReportEvent);
}

/// Reporter that emits events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: ReportEvent) {
        match event {
            ReportEvent::Received { panel, source, line } => {
                debug!(panel = %panel, source = %source, line = %line, "Data received");
            }
            ReportEvent::Suppressed { panel, line } => {
                debug!(panel = %panel, line = %line, "Duplicate or empty line suppressed");
            }
            ReportEvent::Rejected { panel, line, error } => {
                warn!(
                    panel = %panel,
                    line = %line,
                    kind = error.kind_name(),
                    error = %error,
                    "Line rejected"
                );
            }
            ReportEvent::Applied { panel, signal, value } => {
                info!(panel = %panel, signal = %signal, value = %value, "Update applied");
            }
            ReportEvent::Forwarded { panel, port, payload, attempts } => {
                debug!(panel = %panel, port = %port, payload = %payload, attempts, "Payload forwarded");
            }
            ReportEvent::ForwardFailed { panel, port, error } => {
                warn!(panel = %panel, port = %port, error = %error, "Forwarding failed");
            }
            ReportEvent::Dropped { port, line, reason } => {
                warn!(port = %port, line = %line, reason = %reason, "Inbound line dropped");
            }
        }
    }
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out all recorded events, oldest first.
    pub fn events(&self) -> Vec<ReportEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded events concerning one panel.
    pub fn events_for(&self, panel: &str) -> Vec<ReportEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.panel() == Some(panel))
            .collect()
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: ReportEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
