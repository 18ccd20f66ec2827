//! Panels: control surfaces owning a port and a subset of the signal catalog.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{DomainError, DomainResult, Oid};

// ============================================================================
// Plain Construction Data
// ============================================================================

/// Already-deserialized panel settings.
///
/// This is the only shape the core accepts from configuration; it does not
/// depend on any file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub name: String,
    pub port: String,
    pub enabled: bool,
    /// Raw signal names in declaration order
    pub signals: Vec<String>,
}

impl PanelSpec {
    pub fn new(
        name: impl Into<String>,
        port: impl Into<String>,
        enabled: bool,
        signals: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            enabled,
            signals: signals.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Panel
// ============================================================================

/// A control surface registered under a module.
///
/// The signal set is fixed at construction and holds each signal at most
/// once, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    name: String,
    port: String,
    enabled: bool,
    signals: Vec<Oid>,
    skipped_signals: Vec<String>,
}

impl Panel {
    /// Builds a panel, resolving each raw signal name against the catalog.
    ///
    /// Names that do not resolve are logged and left out. A name resolving
    /// to a signal already in the set fails construction.
    ///
    /// # Errors
    /// - `DomainError::EmptyPanelName` if `name` is empty
    /// - `DomainError::DuplicateSignal` on a repeated signal
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        port: impl Into<String>,
        enabled: bool,
        signal_names: &[S],
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::EmptyPanelName);
        }

        let mut signals: Vec<Oid> = Vec::with_capacity(signal_names.len());
        let mut skipped_signals = Vec::new();

        for raw in signal_names {
            let raw = raw.as_ref();
            let oid = Oid::resolve(raw);
            if oid.is_undefined() {
                warn!(panel = %name, signal = raw, "Unknown signal name, skipping");
                skipped_signals.push(raw.to_string());
                continue;
            }
            if signals.contains(&oid) {
                return Err(DomainError::DuplicateSignal { panel: name, signal: oid });
            }
            signals.push(oid);
        }

        Ok(Self {
            name,
            port: port.into(),
            enabled,
            signals,
            skipped_signals,
        })
    }

    /// Builds a panel from plain configuration data.
    pub fn from_spec(spec: &PanelSpec) -> DomainResult<Self> {
        Self::new(spec.name.clone(), spec.port.clone(), spec.enabled, &spec.signals)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Signals this panel may address, in declaration order.
    pub fn signals(&self) -> &[Oid] {
        &self.signals
    }

    /// Raw names that did not resolve during construction.
    pub fn skipped_signals(&self) -> &[String] {
        &self.skipped_signals
    }

    pub fn has_signal(&self, signal: Oid) -> bool {
        self.signals.contains(&signal)
    }

    /// Returns an immutable snapshot for registries and dispatch scopes.
    pub fn descriptor(&self) -> PanelDescriptor {
        PanelDescriptor {
            name: self.name.clone(),
            signals: self.signals.clone(),
            port: self.port.clone(),
            enabled: self.enabled,
        }
    }
}

// ============================================================================
// Panel Descriptor
// ============================================================================

/// Immutable snapshot of a panel's registration data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub name: String,
    pub signals: Vec<Oid>,
    pub port: String,
    pub enabled: bool,
}

impl PanelDescriptor {
    /// Finds a registered signal by its canonical name.
    ///
    /// Never returns `Oid::Undefined`.
    pub fn find_signal(&self, name: &str) -> Option<Oid> {
        self.signals
            .iter()
            .copied()
            .find(|oid| !oid.is_undefined() && oid.as_str() == name)
    }
}

impl From<&Panel> for PanelDescriptor {
    fn from(panel: &Panel) -> Self {
        panel.descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_resolves_signals_in_order() {
        let panel = Panel::new(
            "Pedestal.Trim",
            "COM3",
            true,
            &["PedestalTrimWheel", "OverheadBrightForOledStep"],
        )
        .unwrap();

        assert_eq!(panel.name(), "Pedestal.Trim");
        assert_eq!(panel.port(), "COM3");
        assert!(panel.is_enabled());
        assert_eq!(
            panel.signals(),
            &[Oid::PedestalTrimWheel, Oid::OverheadBrightForOledStep]
        );
    }

    #[test]
    fn test_unknown_names_are_skipped_not_fatal() {
        let panel = Panel::new("Pedestal.Takis", "COM4", true, &["oid1", "Bogus", "Undefined"])
            .unwrap();

        assert_eq!(panel.signals(), &[Oid::Oid1]);
        assert_eq!(panel.skipped_signals(), &["Bogus".to_string(), "Undefined".to_string()]);
    }

    #[test]
    fn test_duplicate_signal_fails_construction() {
        let result = Panel::new("Overhead", "COM1", true, &["oid1", "oid2", "oid1"]);

        assert_eq!(
            result,
            Err(DomainError::DuplicateSignal {
                panel: "Overhead".to_string(),
                signal: Oid::Oid1,
            })
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Panel::new("", "COM1", true, &["oid1"]);
        assert_eq!(result, Err(DomainError::EmptyPanelName));
    }

    #[test]
    fn test_from_spec() {
        let spec = PanelSpec::new("Glareshield.Main", "COM7", false, ["GlareshieldMasterWarning"]);
        let panel = Panel::from_spec(&spec).unwrap();

        assert!(!panel.is_enabled());
        assert!(panel.has_signal(Oid::GlareshieldMasterWarning));
    }

    #[test]
    fn test_descriptor_find_signal() {
        let panel = Panel::new("Pedestal.Takis", "COM4", true, &["oid1", "oid2"]).unwrap();
        let descriptor = panel.descriptor();

        assert_eq!(descriptor.find_signal("oid2"), Some(Oid::Oid2));
        assert_eq!(descriptor.find_signal("oid3"), None);
        assert_eq!(descriptor.find_signal("Undefined"), None);
        assert_eq!(PanelDescriptor::from(&panel), descriptor);
    }
}
