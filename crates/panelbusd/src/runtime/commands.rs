//! Panel actor commands, errors, and status.
//!
//! - `PanelCommand`: commands sent to a `PanelActor`
//! - `PanelError`: errors returned to callers of the runtime
//! - `PanelStatus`: point-in-time view of a running panel

use panelbus_core::{Oid, SignalValue, StateStore};
use panelbus_transport::TransportError;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::dispatch::{Outcome, ScopeKind};

// ============================================================================
// Panel Commands
// ============================================================================

/// Commands sent to a panel actor.
///
/// Request/response commands carry a oneshot sender; the actor ignores a
/// dropped receiver.
#[derive(Debug)]
pub enum PanelCommand {
    /// Run one line through the dispatcher and forward the result.
    Dispatch {
        /// Where the line came from (usually the port)
        source: String,
        line: String,
        respond_to: oneshot::Sender<Outcome>,
    },

    /// Same as `Dispatch` without waiting for the outcome. Used by the
    /// inbound router.
    Submit { source: String, line: String },

    /// Current value of one signal.
    GetValue {
        signal: Oid,
        respond_to: oneshot::Sender<Option<SignalValue>>,
    },

    /// Copy of the whole state store.
    Snapshot { respond_to: oneshot::Sender<StateStore> },

    Status { respond_to: oneshot::Sender<PanelStatus> },
}

// ============================================================================
// Panel Errors
// ============================================================================

/// Errors returned by panel handles and the module runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    /// The actor has stopped; its command channel is gone.
    #[error("panel channel closed")]
    ChannelClosed,

    #[error("unknown panel: {0}")]
    UnknownPanel(String),

    /// The panel is configured with `status = false`.
    #[error("panel is disabled: {0}")]
    PanelDisabled(String),

    #[error("panel is not connected: {0}")]
    NotConnected(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

// ============================================================================
// Panel Status
// ============================================================================

/// Counters kept by a panel actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub received: u64,
    pub applied: u64,
    pub suppressed: u64,
    pub rejected: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
}

/// Snapshot of a running panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelStatus {
    pub panel: String,
    pub port: String,
    pub scope: ScopeKind,
    /// Number of signals with a stored value
    pub stored_signals: usize,
    pub last_resolved_signal: Option<Oid>,
    pub stats: DispatchStats,
}
