//! Lifecycle reports for module-wide fan-out.
//!
//! A stage runs the module-level step and then every panel's step in
//! registration order. One failing panel never stops the others; the report
//! carries each result so callers can decide what to do.

use std::fmt;

use panelbus_transport::TransportError;
use thiserror::Error;

/// Lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Initialize,
    Connect,
    Disconnect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// A lifecycle step failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("module {module} has no panels")]
    NoPanels { module: String },

    #[error("panel {panel} has no port")]
    EmptyPort { panel: String },

    #[error("port {port}: {source}")]
    Transport {
        port: String,
        #[source]
        source: TransportError,
    },

    /// The panel task panicked or was aborted.
    #[error("panel {panel} task failed: {reason}")]
    TaskFailed { panel: String, reason: String },
}

/// What a successful panel step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStepStatus {
    Done,
    /// Nothing to do: the panel is disabled or was never connected.
    Skipped,
}

/// Result of one panel's step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelStep {
    pub panel: String,
    pub result: Result<PanelStepStatus, LifecycleError>,
}

impl PanelStep {
    pub fn done(panel: impl Into<String>) -> Self {
        Self {
            panel: panel.into(),
            result: Ok(PanelStepStatus::Done),
        }
    }

    pub fn skipped(panel: impl Into<String>) -> Self {
        Self {
            panel: panel.into(),
            result: Ok(PanelStepStatus::Skipped),
        }
    }

    pub fn failed(panel: impl Into<String>, error: LifecycleError) -> Self {
        Self {
            panel: panel.into(),
            result: Err(error),
        }
    }
}

/// Outcome of a lifecycle stage across a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub module: String,
    pub stage: Stage,
    pub module_result: Result<(), LifecycleError>,
    /// One entry per panel, in registration order
    pub panels: Vec<PanelStep>,
}

impl LifecycleReport {
    pub fn new(module: impl Into<String>, stage: Stage) -> Self {
        Self {
            module: module.into(),
            stage,
            module_result: Ok(()),
            panels: Vec::new(),
        }
    }

    /// True when the module step and every panel step succeeded.
    pub fn is_success(&self) -> bool {
        self.module_result.is_ok() && self.panels.iter().all(|step| step.result.is_ok())
    }

    pub fn failed_panels(&self) -> Vec<&str> {
        self.panels
            .iter()
            .filter(|step| step.result.is_err())
            .map(|step| step.panel.as_str())
            .collect()
    }

    pub fn count(&self, status: PanelStepStatus) -> usize {
        self.panels
            .iter()
            .filter(|step| step.result.as_ref().ok() == Some(&status))
            .count()
    }

    pub fn step(&self, panel: &str) -> Option<&PanelStep> {
        self.panels.iter().find(|step| step.panel == panel)
    }
}
