//! Modules: named aggregates of panels with a name-unique registry.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::{DomainError, DomainResult, Oid, Panel, PanelDescriptor, PanelSpec};

/// A named aggregate of panels.
///
/// # Registry
///
/// `panels` keeps registration order, which is the order lifecycle calls fan
/// out and the order module-wide signal resolution searches. `registry` maps
/// panel name to descriptor and rejects duplicate names.
///
/// A signal may be claimed by at most one panel per module, so module-wide
/// resolution never has to break a tie.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    panels: Vec<Panel>,
    registry: HashMap<String, PanelDescriptor>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            panels: Vec::new(),
            registry: HashMap::new(),
        }
    }

    /// Builds a module and registers one panel per spec, in order.
    ///
    /// # Errors
    /// The first construction or registration error aborts the build.
    pub fn from_specs(name: impl Into<String>, specs: &[PanelSpec]) -> DomainResult<Self> {
        let mut module = Self::new(name);
        for spec in specs {
            module.add_panel(Panel::from_spec(spec)?)?;
        }
        Ok(module)
    }

    /// Registers a panel.
    ///
    /// Nothing is mutated on failure.
    ///
    /// # Errors
    /// - `DomainError::DuplicatePanel` if a panel with the same name exists
    /// - `DomainError::SignalAlreadyClaimed` if another panel addresses one of its signals
    pub fn add_panel(&mut self, panel: Panel) -> DomainResult<()> {
        if self.registry.contains_key(panel.name()) {
            debug!(
                module = %self.name,
                panel = %panel.name(),
                "Panel already registered, rejecting"
            );
            return Err(DomainError::DuplicatePanel {
                module: self.name.clone(),
                panel: panel.name().to_string(),
            });
        }

        for signal in panel.signals() {
            if let Some(owner) = self.owner_of(*signal) {
                return Err(DomainError::SignalAlreadyClaimed {
                    module: self.name.clone(),
                    panel: panel.name().to_string(),
                    owner: owner.name().to_string(),
                    signal: *signal,
                });
            }
        }

        let descriptor = panel.descriptor();
        self.registry.insert(descriptor.name.clone(), descriptor);

        info!(
            module = %self.name,
            panel = %panel.name(),
            port = %panel.port(),
            enabled = panel.is_enabled(),
            signals = panel.signals().len(),
            "Panel registered"
        );
        self.panels.push(panel);

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered panels in registration order.
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, name: &str) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.name() == name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&PanelDescriptor> {
        self.registry.get(name)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<PanelDescriptor> {
        self.panels
            .iter()
            .filter_map(|panel| self.registry.get(panel.name()).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Resolves a signal name against every registered panel.
    ///
    /// Panels are searched in registration order and the first match wins.
    pub fn resolve_signal(&self, name: &str) -> Option<(&Panel, Oid)> {
        self.panels.iter().find_map(|panel| {
            self.registry
                .get(panel.name())
                .and_then(|descriptor| descriptor.find_signal(name))
                .map(|oid| (panel, oid))
        })
    }

    /// Returns the panel addressing `signal`, if any.
    pub fn owner_of(&self, signal: Oid) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.has_signal(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trim_panel() -> Panel {
        Panel::new("Pedestal.Trim", "COM3", true, &["OverheadBrightForOledStep"]).unwrap()
    }

    fn takis_panel() -> Panel {
        Panel::new("Pedestal.Takis", "COM4", true, &["oid1", "oid2"]).unwrap()
    }

    #[test]
    fn test_add_panels_keeps_order() {
        let mut module = Module::new("Pedestal");
        module.add_panel(trim_panel()).unwrap();
        module.add_panel(takis_panel()).unwrap();

        let names: Vec<&str> = module.panels().iter().map(Panel::name).collect();
        assert_eq!(names, vec!["Pedestal.Trim", "Pedestal.Takis"]);
        assert_eq!(module.len(), 2);
        assert!(module.descriptor("Pedestal.Takis").is_some());
    }

    #[test]
    fn test_duplicate_panel_name_rejected_without_mutation() {
        let mut module = Module::new("Pedestal");
        module.add_panel(trim_panel()).unwrap();

        let clash = Panel::new("Pedestal.Trim", "COM9", false, &["oid3"]).unwrap();
        let result = module.add_panel(clash);

        assert_eq!(
            result,
            Err(DomainError::DuplicatePanel {
                module: "Pedestal".to_string(),
                panel: "Pedestal.Trim".to_string(),
            })
        );
        assert_eq!(module.len(), 1);
        assert_eq!(module.panel("Pedestal.Trim").map(Panel::port), Some("COM3"));
        assert!(module.owner_of(Oid::Oid3).is_none());
    }

    #[test]
    fn test_overlapping_signal_rejected() {
        let mut module = Module::new("Pedestal");
        module.add_panel(takis_panel()).unwrap();

        let overlap = Panel::new("Pedestal.Other", "COM5", true, &["oid3", "oid2"]).unwrap();
        let result = module.add_panel(overlap);

        assert!(matches!(
            result,
            Err(DomainError::SignalAlreadyClaimed { signal: Oid::Oid2, ref owner, .. }) if owner == "Pedestal.Takis"
        ));
        assert_eq!(module.len(), 1);
        assert!(module.descriptor("Pedestal.Other").is_none());
    }

    #[test]
    fn test_resolve_signal_across_panels() {
        let mut module = Module::new("Pedestal");
        module.add_panel(trim_panel()).unwrap();
        module.add_panel(takis_panel()).unwrap();

        let (panel, oid) = module.resolve_signal("oid2").unwrap();
        assert_eq!(panel.name(), "Pedestal.Takis");
        assert_eq!(oid, Oid::Oid2);

        assert!(module.resolve_signal("oid4").is_none());
        assert!(module.resolve_signal("Undefined").is_none());
    }

    #[test]
    fn test_from_specs_stops_at_first_error() {
        let specs = vec![
            PanelSpec::new("A", "COM1", true, ["oid1"]),
            PanelSpec::new("A", "COM2", true, ["oid2"]),
        ];
        let result = Module::from_specs("Overhead", &specs);
        assert!(matches!(result, Err(DomainError::DuplicatePanel { .. })));
    }

    #[test]
    fn test_descriptors_in_registration_order() {
        let module = Module::from_specs(
            "Pedestal",
            &[
                PanelSpec::new("Pedestal.Takis", "COM4", true, ["oid1"]),
                PanelSpec::new("Pedestal.Trim", "COM3", false, ["OverheadBrightForOledStep"]),
            ],
        )
        .unwrap();

        let descriptors = module.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors.first().map(|d| d.name.as_str()), Some("Pedestal.Takis"));
        assert_eq!(descriptors.last().map(|d| d.enabled), Some(false));
    }
}
