//! Integration tests for dispatching against modules built from config.

use std::sync::Arc;

use panelbus_core::{DomainError, Module, Oid, Panel, PanelSpec};
use panelbusd::config::SystemConfig;
use panelbusd::dispatch::{Dispatcher, Outcome, OutcomeKind, ResolutionScope};
use panelbusd::reporter::{MemoryReporter, ReportEvent};

const CONFIG: &str = r#"
[[modules]]
name = "Pedestal"

[[modules.panels]]
name = "Trim"
oids = ["OverheadBrightForOledStep", "PedestalTrimWheel"]
port = "COM3"

[[modules.panels]]
name = "Takis"
oids = ["oid1", "oid2", "oid3"]
port = "COM4"

[[modules]]
name = "Glareshield"

[[modules.panels]]
name = "Warnings"
oids = ["GlareshieldMasterWarning", "GlareshieldMasterCaution"]
port = "COM7"
"#;

fn modules() -> Vec<Module> {
    SystemConfig::from_toml_str(CONFIG)
        .expect("valid config")
        .build_modules()
        .expect("valid modules")
}

fn panel_dispatcher(module: &Module, panel: &str) -> (Dispatcher, Arc<MemoryReporter>) {
    let descriptor = module.descriptor(panel).cloned().expect("panel exists");
    let reporter = Arc::new(MemoryReporter::new());
    let dispatcher = Dispatcher::new(panel, ResolutionScope::panel(descriptor), reporter.clone());
    (dispatcher, reporter)
}

#[test]
fn test_scenarios_from_configured_panels() {
    let modules = modules();
    let pedestal = &modules[0];

    let (mut trim, _) = panel_dispatcher(pedestal, "Pedestal.Trim");
    let outcome = trim.on_data_received("COM3", "OverheadBrightForOledStep I 100");
    assert_eq!(outcome.kind(), OutcomeKind::Applied);
    assert_eq!(trim.state().get_int(Oid::OverheadBrightForOledStep), Ok(100));

    let (mut takis, _) = panel_dispatcher(pedestal, "Pedestal.Takis");
    let outcome = takis.on_data_received("COM4", "oid1 F 12.5");
    assert_eq!(outcome.kind(), OutcomeKind::Applied);
    assert_eq!(takis.state().get_float(Oid::Oid1), Ok(12.5));

    let outcome = takis.on_data_received("COM4", "oid3 B nottrue");
    assert_eq!(outcome.kind(), OutcomeKind::ValueInvalid);
    assert!(!takis.state().contains(Oid::Oid3));
}

#[test]
fn test_panels_keep_separate_state() {
    let modules = modules();
    let glareshield = &modules[1];
    let (mut warnings, reporter) = panel_dispatcher(glareshield, "Glareshield.Warnings");

    assert!(warnings
        .on_data_received("COM7", "GlareshieldMasterWarning B TRUE")
        .is_success());
    assert!(warnings
        .on_data_received("COM7", "GlareshieldMasterCaution B false")
        .is_success());
    // Pedestal signals are not visible from another module's panel
    assert_eq!(
        warnings.on_data_received("COM7", "oid1 I 1").kind(),
        OutcomeKind::SignalUnresolved
    );

    assert_eq!(warnings.state().get_bool(Oid::GlareshieldMasterWarning), Ok(true));
    assert_eq!(warnings.state().get_bool(Oid::GlareshieldMasterCaution), Ok(false));
    assert_eq!(warnings.state().len(), 2);

    let applied = reporter
        .events_for("Glareshield.Warnings")
        .into_iter()
        .filter(|e| matches!(e, ReportEvent::Applied { .. }))
        .count();
    assert_eq!(applied, 2);
}

#[test]
fn test_duplicate_after_rejection_is_applied() {
    let modules = modules();
    let (mut takis, _) = panel_dispatcher(&modules[0], "Pedestal.Takis");

    assert_eq!(takis.on_data_received("COM4", "oid2 I 1").kind(), OutcomeKind::Applied);
    assert_eq!(takis.on_data_received("COM4", "oid2 I x").kind(), OutcomeKind::ValueInvalid);
    // Only applied lines are remembered; a repeat of the last applied line
    // is still suppressed after a rejection
    assert_eq!(takis.on_data_received("COM4", "oid2 I 1"), Outcome::Suppressed);
    assert_eq!(takis.on_data_received("COM4", "oid2 I 2").kind(), OutcomeKind::Applied);
}

#[test]
fn test_type_mismatch_on_read() {
    let modules = modules();
    let (mut trim, _) = panel_dispatcher(&modules[0], "Pedestal.Trim");

    trim.on_data_received("COM3", "PedestalTrimWheel F -0.25");

    assert_eq!(trim.state().get_float(Oid::PedestalTrimWheel), Ok(-0.25));
    assert!(matches!(
        trim.state().get_int(Oid::PedestalTrimWheel),
        Err(DomainError::WrongType { .. })
    ));
    assert_eq!(
        trim.state().get_int(Oid::OverheadBrightForOledStep),
        Err(DomainError::Unset(Oid::OverheadBrightForOledStep))
    );
}

#[test]
fn test_duplicate_panel_leaves_module_unchanged() {
    let mut module = Module::from_specs(
        "Pedestal",
        &[PanelSpec::new("Pedestal.Trim", "COM3", true, ["oid1"])],
    )
    .unwrap();

    let duplicate = Panel::new("Pedestal.Trim", "COM9", true, &["oid2"]).unwrap();
    let err = module.add_panel(duplicate).unwrap_err();

    assert!(matches!(err, DomainError::DuplicatePanel { .. }));
    assert_eq!(module.len(), 1);
    assert_eq!(module.panel("Pedestal.Trim").unwrap().port(), "COM3");
}

#[test]
fn test_duplicate_signal_fails_panel_construction() {
    let result = Panel::new("Pedestal.Trim", "COM3", true, &["oid1", "oid2", "oid1"]);

    assert!(matches!(
        result,
        Err(DomainError::DuplicateSignal { signal: Oid::Oid1, .. })
    ));
}
