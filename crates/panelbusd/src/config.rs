//! TOML configuration.
//!
//! ```toml
//! [runtime]
//! scope = "panel"
//! retry_attempts = 3
//!
//! [[modules]]
//! name = "Pedestal"
//!
//! [[modules.panels]]
//! name = "Trim"
//! oids = ["OverheadBrightForOledStep"]
//! port = "COM3"
//! status = true
//! ```
//!
//! Panels are registered under their qualified name `<module>.<panel>`, in
//! document order. The core crates only ever see [`PanelSpec`] values.

use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use panelbus_core::{DomainError, Module, PanelSpec};
use panelbus_transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dispatch::ScopeKind;
use crate::runtime::{RuntimeSettings, DEFAULT_COMMAND_BUFFER};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PANELBUS_CONFIG";

/// Environment variable overriding `runtime.scope`.
pub const SCOPE_ENV: &str = "PANELBUS_SCOPE";

const CONFIG_DIR: &str = "panelbus";
const CONFIG_FILE: &str = "panelbus.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid resolution scope {0:?} (expected \"panel\" or \"module\")")]
    InvalidScope(String),

    #[error("module {0} is defined more than once")]
    DuplicateModule(String),

    #[error("port {port} is used by modules {first} and {second}")]
    DuplicatePort {
        port: String,
        first: String,
        second: String,
    },

    #[error("module {module}: {source}")]
    Domain {
        module: String,
        #[source]
        source: DomainError,
    },
}

// ============================================================================
// Document
// ============================================================================

/// Whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// `[runtime]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// `panel` or `module`
    pub scope: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub command_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            scope: ScopeKind::default().to_string(),
            retry_attempts: retry.max_attempts,
            retry_base_delay_ms: retry.base_delay.as_millis() as u64,
            retry_max_delay_ms: retry.max_delay.as_millis() as u64,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Short name, qualified with the module name on registration
    pub name: String,
    #[serde(default)]
    pub oids: Vec<String>,
    pub port: String,
    /// Enabled flag
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_status() -> bool {
    true
}

impl SystemConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), modules = config.modules.len(), "Configuration loaded");
        Ok(config)
    }

    /// Replaces the scope, e.g. from a command-line flag.
    pub fn apply_scope_override(&mut self, scope: Option<&str>) {
        if let Some(scope) = scope {
            debug!(scope, "Scope overridden");
            self.runtime.scope = scope.to_string();
        }
    }

    /// Applies `PANELBUS_SCOPE` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(scope) = env::var(SCOPE_ENV) {
            self.apply_scope_override(Some(&scope));
        }
    }

    /// Validated runtime settings.
    pub fn settings(&self) -> Result<RuntimeSettings, ConfigError> {
        let scope = self
            .runtime
            .scope
            .parse::<ScopeKind>()
            .map_err(|_| ConfigError::InvalidScope(self.runtime.scope.clone()))?;

        Ok(RuntimeSettings {
            scope,
            retry: RetryPolicy {
                max_attempts: self.runtime.retry_attempts,
                base_delay: Duration::from_millis(self.runtime.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.runtime.retry_max_delay_ms),
            },
            command_buffer: self.runtime.command_buffer,
        })
    }

    /// Builds every module, registering panels in document order.
    ///
    /// # Errors
    /// - `ConfigError::DuplicateModule` on a repeated module name
    /// - `ConfigError::DuplicatePort` if two modules share a port
    /// - `ConfigError::Domain` on the first panel that cannot be registered
    pub fn build_modules(&self) -> Result<Vec<Module>, ConfigError> {
        let mut seen = HashSet::new();
        let mut port_owners: HashMap<&str, &str> = HashMap::new();
        let mut modules = Vec::with_capacity(self.modules.len());

        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(ConfigError::DuplicateModule(module.name.clone()));
            }

            // A port belongs to one module; panels of that module may share it
            for panel in &module.panels {
                let owner = *port_owners
                    .entry(panel.port.as_str())
                    .or_insert(module.name.as_str());
                if owner != module.name {
                    return Err(ConfigError::DuplicatePort {
                        port: panel.port.clone(),
                        first: owner.to_string(),
                        second: module.name.clone(),
                    });
                }
            }

            let specs = module.panel_specs();
            let built = Module::from_specs(&module.name, &specs).map_err(|source| {
                ConfigError::Domain {
                    module: module.name.clone(),
                    source,
                }
            })?;
            modules.push(built);
        }

        Ok(modules)
    }
}

impl ModuleConfig {
    /// Panel specs with qualified names.
    pub fn panel_specs(&self) -> Vec<PanelSpec> {
        self.panels
            .iter()
            .map(|panel| {
                PanelSpec::new(
                    format!("{}.{}", self.name, panel.name),
                    &panel.port,
                    panel.status,
                    &panel.oids,
                )
            })
            .collect()
    }
}

/// Picks the config file: explicit path, then `PANELBUS_CONFIG`, then
/// `<config_dir>/panelbus/panelbus.toml`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelbus_core::Oid;
    use std::io::Write;

    const SAMPLE: &str = r#"
[runtime]
scope = "module"
retry_attempts = 5
retry_base_delay_ms = 50

[[modules]]
name = "Pedestal"

[[modules.panels]]
name = "Trim"
oids = ["OverheadBrightForOledStep", "PedestalTrimWheel"]
port = "COM3"

[[modules.panels]]
name = "Takis"
oids = ["oid1", "NotASignal"]
port = "COM4"
status = false
"#;

    #[test]
    fn test_parse_sample() {
        let config = SystemConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.modules.len(), 1);
        let pedestal = &config.modules[0];
        assert_eq!(pedestal.panels.len(), 2);
        assert!(pedestal.panels[0].status);
        assert!(!pedestal.panels[1].status);

        let settings = config.settings().unwrap();
        assert_eq!(settings.scope, ScopeKind::Module);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(50));
        // Unset keys keep their defaults
        assert_eq!(settings.retry.max_delay, Duration::from_secs(2));
        assert_eq!(settings.command_buffer, DEFAULT_COMMAND_BUFFER);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SystemConfig::from_toml_str("").unwrap();
        assert!(config.modules.is_empty());
        assert_eq!(config.settings().unwrap(), RuntimeSettings::default());
    }

    #[test]
    fn test_build_modules_qualifies_names() {
        let config = SystemConfig::from_toml_str(SAMPLE).unwrap();
        let modules = config.build_modules().unwrap();

        let module = &modules[0];
        assert_eq!(module.name(), "Pedestal");
        let names: Vec<_> = module.panels().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Pedestal.Trim", "Pedestal.Takis"]);

        let takis = module.panel("Pedestal.Takis").unwrap();
        assert!(!takis.is_enabled());
        assert_eq!(takis.signals(), &[Oid::Oid1]);
        assert_eq!(takis.skipped_signals(), &["NotASignal".to_string()]);
    }

    #[test]
    fn test_duplicate_panel_is_domain_error() {
        let doc = r#"
[[modules]]
name = "M"
[[modules.panels]]
name = "A"
port = "COM1"
[[modules.panels]]
name = "A"
port = "COM2"
"#;
        let err = SystemConfig::from_toml_str(doc)
            .unwrap()
            .build_modules()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Domain {
                source: DomainError::DuplicatePanel { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let doc = r#"
[[modules]]
name = "M"
[[modules]]
name = "M"
"#;
        let err = SystemConfig::from_toml_str(doc)
            .unwrap()
            .build_modules()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModule(name) if name == "M"));
    }

    #[test]
    fn test_port_shared_across_modules_rejected() {
        let doc = r#"
[[modules]]
name = "Pedestal"
[[modules.panels]]
name = "Trim"
port = "COM3"
[[modules]]
name = "Glareshield"
[[modules.panels]]
name = "Warnings"
port = "COM3"
"#;
        let err = SystemConfig::from_toml_str(doc)
            .unwrap()
            .build_modules()
            .unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::DuplicatePort { port, first, second }
                if port == "COM3" && first == "Pedestal" && second == "Glareshield"
        ));
        assert_eq!(
            err.to_string(),
            "port COM3 is used by modules Pedestal and Glareshield"
        );
    }

    #[test]
    fn test_port_shared_within_module_allowed() {
        let doc = r#"
[[modules]]
name = "Pedestal"
[[modules.panels]]
name = "Trim"
port = "COM3"
[[modules.panels]]
name = "Flaps"
port = "COM3"
"#;
        let modules = SystemConfig::from_toml_str(doc)
            .unwrap()
            .build_modules()
            .unwrap();
        assert_eq!(modules[0].len(), 2);
    }

    #[test]
    fn test_invalid_scope() {
        let mut config = SystemConfig::default();
        config.apply_scope_override(Some("global"));
        assert!(matches!(config.settings(), Err(ConfigError::InvalidScope(s)) if s == "global"));

        config.apply_scope_override(Some("MODULE"));
        assert_eq!(config.settings().unwrap().scope, ScopeKind::Module);

        config.apply_scope_override(None);
        assert_eq!(config.settings().unwrap().scope, ScopeKind::Module);
    }

    #[test]
    fn test_missing_port_is_parse_error() {
        let doc = r#"
[[modules]]
name = "M"
[[modules.panels]]
name = "A"
"#;
        assert!(matches!(
            SystemConfig::from_toml_str(doc),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = SystemConfig::load(file.path()).unwrap();
        assert_eq!(config.modules[0].name, "Pedestal");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = SystemConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = PathBuf::from("/etc/panelbus.toml");
        assert_eq!(
            resolve_config_path(Some(explicit.clone())),
            Some(explicit)
        );
    }
}
