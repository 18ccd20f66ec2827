//! Message dispatcher: parse, resolve, coerce, apply.
//!
//! One [`Dispatcher`] exists per panel. It turns a raw line into a typed
//! state update and the payload to forward, or into one of the rejection
//! outcomes. The pipeline is synchronous and runs to completion on every
//! call; nothing is carried between calls except the duplicate-suppression
//! memory.
//!
//! ```text
//! raw line ─▶ suppress? ─▶ tokenize ─▶ resolve signal ─▶ coerce ─▶ StateStore
//!                │            │              │              │          │
//!           Suppressed   FormatInvalid  SignalUnresolved  TypeUnknown  Applied
//!                                                         ValueInvalid
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use panelbus_core::{Oid, PanelDescriptor, SignalValue, StateStore};
use panelbus_protocol::{ForwardPayload, ParseError, ParsedMessage, TypeTag};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reporter::{ReportEvent, Reporter};

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Why a line was rejected. All variants are recoverable; state is left
/// unchanged and the line is not remembered for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Wrong number of space-separated fields.
    #[error("expected 3 fields, found {found}")]
    FormatInvalid { found: usize },

    /// The first field names no signal registered in scope.
    #[error("signal {link:?} is not registered in this scope")]
    SignalUnresolved { link: String },

    /// The type tag is not `I`, `F` or `B`.
    #[error("unknown type tag {tag:?}")]
    TypeUnknown { tag: String },

    /// The value does not parse for its declared type.
    #[error("invalid {tag} value {value:?}: {reason}")]
    ValueInvalid {
        tag: TypeTag,
        value: String,
        reason: String,
    },
}

impl DispatchError {
    /// Stable name of the failure kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::FormatInvalid { .. } => OutcomeKind::FormatInvalid,
            Self::SignalUnresolved { .. } => OutcomeKind::SignalUnresolved,
            Self::TypeUnknown { .. } => OutcomeKind::TypeUnknown,
            Self::ValueInvalid { .. } => OutcomeKind::ValueInvalid,
        }
    }
}

impl From<ParseError> for DispatchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::FieldCount { found } => Self::FormatInvalid { found },
            ParseError::UnknownType(tag) => Self::TypeUnknown { tag },
            ParseError::InvalidValue { tag, value, reason } => {
                Self::ValueInvalid { tag, value, reason }
            }
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Terminal outcome of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Suppressed,
    FormatInvalid,
    SignalUnresolved,
    TypeUnknown,
    ValueInvalid,
    Applied,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suppressed => "suppressed",
            Self::FormatInvalid => "format_invalid",
            Self::SignalUnresolved => "signal_unresolved",
            Self::TypeUnknown => "type_unknown",
            Self::ValueInvalid => "value_invalid",
            Self::Applied => "applied",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub signal: Oid,
    pub value: SignalValue,
    /// Value held before this update, if any
    pub previous: Option<SignalValue>,
    /// Re-serialized message to forward
    pub payload: ForwardPayload,
}

/// Result of [`Dispatcher::on_data_received`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Empty or unchanged line; treated as success.
    Suppressed,
    Applied(AppliedUpdate),
    Rejected(DispatchError),
}

impl Outcome {
    /// True for `Suppressed` and `Applied`.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Suppressed => OutcomeKind::Suppressed,
            Self::Applied(_) => OutcomeKind::Applied,
            Self::Rejected(err) => err.kind(),
        }
    }

    pub fn applied(&self) -> Option<&AppliedUpdate> {
        match self {
            Self::Applied(update) => Some(update),
            _ => None,
        }
    }
}

// ============================================================================
// Resolution Scope
// ============================================================================

/// Which scope a dispatcher resolves signals against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Only the panel's own signals
    #[default]
    Panel,
    /// Every panel registered under the module
    Module,
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panel" => Ok(Self::Panel),
            "module" => Ok(Self::Module),
            other => Err(format!("unknown resolution scope {other:?} (expected panel or module)")),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panel => f.write_str("panel"),
            Self::Module => f.write_str("module"),
        }
    }
}

/// Signals a dispatcher may resolve, as a read-only snapshot.
#[derive(Debug, Clone)]
pub enum ResolutionScope {
    /// A single panel's signal set.
    Panel(Arc<PanelDescriptor>),

    /// All panels of a module, in registration order. The first panel
    /// registering a name wins; modules reject overlapping names, so in
    /// practice at most one panel matches.
    Module {
        module: String,
        panels: Arc<[PanelDescriptor]>,
    },
}

impl ResolutionScope {
    pub fn panel(descriptor: PanelDescriptor) -> Self {
        Self::Panel(Arc::new(descriptor))
    }

    pub fn module(module: impl Into<String>, panels: Vec<PanelDescriptor>) -> Self {
        Self::Module {
            module: module.into(),
            panels: panels.into(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Panel(_) => ScopeKind::Panel,
            Self::Module { .. } => ScopeKind::Module,
        }
    }

    /// Finds a registered signal by canonical name. Never yields `Undefined`.
    pub fn resolve(&self, link: &str) -> Option<Oid> {
        match self {
            Self::Panel(descriptor) => descriptor.find_signal(link),
            Self::Module { panels, .. } => panels.iter().find_map(|d| d.find_signal(link)),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Per-panel dispatch pipeline and its state store.
pub struct Dispatcher {
    panel: String,
    scope: ResolutionScope,
    state: StateStore,
    reporter: Arc<dyn Reporter>,
    last_raw_message: Option<String>,
    previous_raw_message: Option<String>,
    last_resolved_signal: Option<Oid>,
}

impl Dispatcher {
    pub fn new(panel: impl Into<String>, scope: ResolutionScope, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            panel: panel.into(),
            scope,
            state: StateStore::new(),
            reporter,
            last_raw_message: None,
            previous_raw_message: None,
            last_resolved_signal: None,
        }
    }

    /// Starts from an existing store instead of an empty one.
    #[must_use]
    pub fn with_state(mut self, state: StateStore) -> Self {
        self.state = state;
        self
    }

    /// Runs the full pipeline for one received line.
    ///
    /// Only an `Applied` outcome advances duplicate suppression, so a
    /// rejected line is reported again every time it is received.
    pub fn on_data_received(&mut self, source: &str, raw_line: &str) -> Outcome {
        self.reporter.report(ReportEvent::Received {
            panel: self.panel.clone(),
            source: source.to_string(),
            line: raw_line.to_string(),
        });

        self.last_raw_message = Some(raw_line.to_string());

        if raw_line.is_empty() || self.previous_raw_message.as_deref() == Some(raw_line) {
            self.reporter.report(ReportEvent::Suppressed {
                panel: self.panel.clone(),
                line: raw_line.to_string(),
            });
            return Outcome::Suppressed;
        }

        match self.apply(raw_line) {
            Ok(update) => {
                self.previous_raw_message = Some(raw_line.to_string());
                self.reporter.report(ReportEvent::Applied {
                    panel: self.panel.clone(),
                    signal: update.signal,
                    value: update.value,
                });
                Outcome::Applied(update)
            }
            Err(error) => {
                self.reporter.report(ReportEvent::Rejected {
                    panel: self.panel.clone(),
                    line: raw_line.to_string(),
                    error: error.clone(),
                });
                Outcome::Rejected(error)
            }
        }
    }

    fn apply(&mut self, raw_line: &str) -> Result<AppliedUpdate, DispatchError> {
        let message = ParsedMessage::parse(raw_line)?;

        let signal = self
            .scope
            .resolve(message.link())
            .ok_or_else(|| DispatchError::SignalUnresolved {
                link: message.link().to_string(),
            })?;
        self.last_resolved_signal = Some(signal);

        let value = message.value()?;
        let previous = self.state.set(signal, value);

        Ok(AppliedUpdate {
            signal,
            value,
            previous,
            payload: ForwardPayload::from(&message),
        })
    }

    pub fn panel(&self) -> &str {
        &self.panel
    }

    pub fn scope(&self) -> &ResolutionScope {
        &self.scope
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Most recently received line, applied or not.
    pub fn last_raw_message(&self) -> Option<&str> {
        self.last_raw_message.as_deref()
    }

    /// Most recently applied line.
    pub fn previous_raw_message(&self) -> Option<&str> {
        self.previous_raw_message.as_deref()
    }

    pub fn last_resolved_signal(&self) -> Option<Oid> {
        self.last_resolved_signal
    }
}
