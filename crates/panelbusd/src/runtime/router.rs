//! Inbound router - the single consumer of a transport's line stream.
//!
//! One router serves every module sharing a transport. Lines are handed to
//! the panel actors owning their port; a line is dropped (and reported)
//! only when no module routes its port.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use panelbus_transport::InboundLine;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::PanelHandle;
use super::module::ModuleRuntime;
use crate::reporter::{ReportEvent, Reporter};

/// Port to panel actors, built from connected modules.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<PanelHandle>>,
    disabled_ports: HashSet<String>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every connected panel of `runtime`. Ports of disabled panels
    /// are remembered so their lines are reported as such.
    pub fn add_module(&mut self, runtime: &ModuleRuntime) {
        for panel in runtime.module().panels() {
            match runtime.handle(panel.name()) {
                Some(handle) => self
                    .routes
                    .entry(panel.port().to_string())
                    .or_default()
                    .push(handle.clone()),
                None if !panel.is_enabled() => {
                    self.disabled_ports.insert(panel.port().to_string());
                }
                None => {}
            }
        }
    }

    /// Panels receiving lines from `port`.
    pub fn panels_on(&self, port: &str) -> Vec<&str> {
        self.routes
            .get(port)
            .map(|handles| handles.iter().map(PanelHandle::name).collect())
            .unwrap_or_default()
    }

    /// Number of routed ports.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn drop_reason(&self, port: &str) -> &'static str {
        if self.disabled_ports.contains(port) {
            "panel disabled"
        } else {
            "no panel on port"
        }
    }
}

/// Counters returned when a router stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Lines handed to at least one panel actor
    pub routed: usize,
    /// Lines reported as dropped
    pub dropped: usize,
}

/// Running router task.
pub struct InboundRouter {
    cancel: CancellationToken,
    task: JoinHandle<RouterStats>,
}

impl InboundRouter {
    /// Spawns the router. It runs until the inbound stream ends or `cancel`
    /// fires.
    pub fn spawn(
        rx: mpsc::Receiver<InboundLine>,
        table: RoutingTable,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Self {
        let task = tokio::spawn(route_inbound(rx, table, reporter, cancel.clone()));
        Self { cancel, task }
    }

    /// Waits until every inbound line has been handed to its panel.
    ///
    /// Handing off is not processing: use `ModuleRuntime::drain` to wait
    /// for the actors afterwards.
    pub async fn finish(self) -> RouterStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Router task failed");
                RouterStats::default()
            }
        }
    }

    /// Stops routing without waiting for the stream to end.
    pub async fn stop(self) -> RouterStats {
        self.cancel.cancel();
        self.finish().await
    }
}

async fn route_inbound(
    mut rx: mpsc::Receiver<InboundLine>,
    table: RoutingTable,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
) -> RouterStats {
    debug!(ports = table.len(), "Inbound router starting");
    let mut stats = RouterStats::default();

    'lines: loop {
        let inbound = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(inbound) => inbound,
                None => break,
            }
        };

        let Some(handles) = table.routes.get(&inbound.port) else {
            stats.dropped += 1;
            reporter.report(ReportEvent::Dropped {
                reason: table.drop_reason(&inbound.port).to_string(),
                port: inbound.port,
                line: inbound.line,
            });
            continue;
        };

        let mut delivered = false;
        for handle in handles {
            // Waits while the panel's queue is full
            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'lines,
                submitted = handle.submit(&inbound.port, &inbound.line) => submitted,
            };
            if submitted.is_ok() {
                delivered = true;
            } else {
                reporter.report(ReportEvent::Dropped {
                    port: inbound.port.clone(),
                    line: inbound.line.clone(),
                    reason: format!("panel {} not connected", handle.name()),
                });
            }
        }

        if delivered {
            stats.routed += 1;
        } else {
            stats.dropped += 1;
        }
    }

    info!(routed = stats.routed, dropped = stats.dropped, "Inbound router stopped");
    stats
}
