//! Module runtime - lifecycle fan-out for one module's panels.

use std::collections::HashMap;
use std::sync::Arc;

use panelbus_core::Module;
use panelbus_transport::Transport;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::PanelError;
use super::handle::PanelHandle;
use super::lifecycle::{LifecycleError, LifecycleReport, PanelStep, Stage};
use super::{spawn_panel, RuntimeSettings};
use crate::dispatch::{Outcome, ResolutionScope, ScopeKind};
use crate::reporter::Reporter;

struct ConnectedPanel {
    handle: PanelHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives one module's panels over a shared transport.
///
/// The module registry is fixed at construction. `connect_all` spawns an
/// actor per enabled panel; `disconnect_all` stops them again. A panel
/// that is not connected is never dispatched to. Inbound lines reach the
/// actors through an `InboundRouter` shared by every module.
pub struct ModuleRuntime {
    module: Module,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    settings: RuntimeSettings,
    connected: HashMap<String, ConnectedPanel>,
}

impl ModuleRuntime {
    pub fn new(module: Module, transport: Arc<dyn Transport>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            module,
            transport,
            reporter,
            settings: RuntimeSettings::default(),
            connected: HashMap::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Validates the module and every panel, and records the settings used
    /// by the next `connect_all`.
    pub fn initialize_all(&mut self, settings: RuntimeSettings) -> LifecycleReport {
        let mut report = LifecycleReport::new(self.module.name(), Stage::Initialize);

        self.settings = settings;
        if self.module.is_empty() {
            report.module_result = Err(LifecycleError::NoPanels {
                module: self.module.name().to_string(),
            });
        }

        for panel in self.module.panels() {
            let step = if panel.port().trim().is_empty() {
                PanelStep::failed(
                    panel.name(),
                    LifecycleError::EmptyPort {
                        panel: panel.name().to_string(),
                    },
                )
            } else {
                PanelStep::done(panel.name())
            };
            report.panels.push(step);
        }

        info!(
            module = %self.module.name(),
            panels = self.module.len(),
            scope = %self.settings.scope,
            success = report.is_success(),
            "Module initialized"
        );
        report
    }

    /// Opens every enabled panel's port and spawns its actor. Already
    /// connected panels are left running.
    pub async fn connect_all(&mut self) -> LifecycleReport {
        let mut report = LifecycleReport::new(self.module.name(), Stage::Connect);

        let module_scope = match self.settings.scope {
            ScopeKind::Module => Some(ResolutionScope::module(
                self.module.name(),
                self.module.descriptors(),
            )),
            ScopeKind::Panel => None,
        };

        for panel in self.module.panels() {
            let name = panel.name();

            if !panel.is_enabled() {
                debug!(panel = %name, "Panel disabled, not connecting");
                report.panels.push(PanelStep::skipped(name));
                continue;
            }
            if self.connected.contains_key(name) {
                report.panels.push(PanelStep::done(name));
                continue;
            }

            if let Err(e) = self.transport.open(panel.port()).await {
                warn!(panel = %name, port = %panel.port(), error = %e, "Failed to open port");
                report.panels.push(PanelStep::failed(
                    name,
                    LifecycleError::Transport {
                        port: panel.port().to_string(),
                        source: e,
                    },
                ));
                continue;
            }

            let descriptor = panel.descriptor();
            let scope = module_scope
                .clone()
                .unwrap_or_else(|| ResolutionScope::panel(descriptor.clone()));
            let cancel = CancellationToken::new();
            let (handle, task) = spawn_panel(
                &descriptor,
                scope,
                self.transport.clone(),
                self.reporter.clone(),
                &self.settings,
                cancel.clone(),
            );

            self.connected.insert(
                name.to_string(),
                ConnectedPanel {
                    handle,
                    cancel,
                    task,
                },
            );
            report.panels.push(PanelStep::done(name));
        }

        info!(
            module = %self.module.name(),
            connected = self.connected.len(),
            failed = report.failed_panels().len(),
            "Module connected"
        );
        report
    }

    /// Cancels and joins every panel actor and closes its port.
    ///
    /// Commands still queued at an actor are discarded; call `drain` first
    /// to let them finish.
    pub async fn disconnect_all(&mut self) -> LifecycleReport {
        let mut report = LifecycleReport::new(self.module.name(), Stage::Disconnect);

        for panel in self.module.panels() {
            let name = panel.name();
            let Some(connected) = self.connected.remove(name) else {
                report.panels.push(PanelStep::skipped(name));
                continue;
            };

            connected.cancel.cancel();
            if let Err(e) = connected.task.await {
                report.panels.push(PanelStep::failed(
                    name,
                    LifecycleError::TaskFailed {
                        panel: name.to_string(),
                        reason: e.to_string(),
                    },
                ));
                continue;
            }

            let step = match self.transport.close(panel.port()).await {
                Ok(()) => PanelStep::done(name),
                Err(e) => PanelStep::failed(
                    name,
                    LifecycleError::Transport {
                        port: panel.port().to_string(),
                        source: e,
                    },
                ),
            };
            report.panels.push(step);
        }

        info!(module = %self.module.name(), "Module disconnected");
        report
    }

    /// Dispatches a line to a panel and waits for the outcome.
    ///
    /// # Errors
    ///
    /// - `PanelError::UnknownPanel` if the module has no such panel
    /// - `PanelError::PanelDisabled` if the panel is disabled
    /// - `PanelError::NotConnected` if the panel has no running actor
    /// - `PanelError::ChannelClosed` if the actor stopped meanwhile
    pub async fn dispatch(&self, panel: &str, line: &str) -> Result<Outcome, PanelError> {
        let registered = self
            .module
            .panel(panel)
            .ok_or_else(|| PanelError::UnknownPanel(panel.to_string()))?;
        if !registered.is_enabled() {
            return Err(PanelError::PanelDisabled(panel.to_string()));
        }
        let handle = self
            .handle(panel)
            .ok_or_else(|| PanelError::NotConnected(panel.to_string()))?;

        handle.dispatch(registered.port(), line).await
    }

    /// Waits until every connected actor has processed the commands queued
    /// before this call, forwards included.
    ///
    /// Returns the number of panels drained.
    pub async fn drain(&self) -> usize {
        let mut drained = 0;
        for name in self.connected_panels() {
            let Some(connected) = self.connected.get(name) else {
                continue;
            };
            // Commands are handled in order, so the reply marks the end of the queue
            match connected.handle.status().await {
                Ok(_) => drained += 1,
                Err(e) => warn!(panel = %name, error = %e, "Panel stopped before draining"),
            }
        }
        debug!(module = %self.module.name(), drained, "Module drained");
        drained
    }

    /// Handle to a connected panel.
    pub fn handle(&self, panel: &str) -> Option<&PanelHandle> {
        self.connected.get(panel).map(|c| &c.handle)
    }

    pub fn is_connected(&self, panel: &str) -> bool {
        self.connected.contains_key(panel)
    }

    /// Names of connected panels, in registration order.
    pub fn connected_panels(&self) -> Vec<&str> {
        self.module
            .panels()
            .iter()
            .map(|p| p.name())
            .filter(|name| self.connected.contains_key(*name))
            .collect()
    }
}
