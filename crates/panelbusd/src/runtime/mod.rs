//! Panel runtime using the actor pattern.
//!
//! Every connected, enabled panel runs as its own `PanelActor`, owning its
//! dispatcher and state store. A `ModuleRuntime` drives the lifecycle of all
//! panels in a module. One `InboundRouter` consumes the transport's line
//! stream and hands each line to the panels on its port, across modules.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  InboundLine  ┌──────────────┐  PanelCommand  ┌─────────────┐
//! │  Transport  │──────────────▶│ Inbound      │───────────────▶│ PanelActor  │
//! │   (mpsc)    │               │ router       │  (mpsc, per    │ Dispatcher  │
//! └─────────────┘               └──────────────┘   panel)       │ StateStore  │
//!        ▲                                                       └──────┬──────┘
//!        │                    ForwardPayload (write_with_retry)         │
//!        └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use panelbus_core::PanelDescriptor;
use panelbus_transport::{RetryPolicy, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Dispatcher, ResolutionScope, ScopeKind};
use crate::reporter::Reporter;

mod actor;
mod commands;
mod handle;
mod lifecycle;
mod module;
mod router;

pub use actor::PanelActor;
pub use commands::{DispatchStats, PanelCommand, PanelError, PanelStatus};
pub use handle::PanelHandle;
pub use lifecycle::{LifecycleError, LifecycleReport, PanelStep, PanelStepStatus, Stage};
pub use module::ModuleRuntime;
pub use router::{InboundRouter, RouterStats, RoutingTable};

/// Default capacity of a panel's command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Settings shared by every panel of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub scope: ScopeKind,
    pub retry: RetryPolicy,
    /// Command channel capacity; zero is treated as one
    pub command_buffer: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            scope: ScopeKind::default(),
            retry: RetryPolicy::default(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

/// Spawns the actor for one panel and returns its handle and task.
///
/// The actor stops when `cancel` fires or every handle is dropped.
pub fn spawn_panel(
    descriptor: &PanelDescriptor,
    scope: ResolutionScope,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    settings: &RuntimeSettings,
    cancel: CancellationToken,
) -> (PanelHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(settings.command_buffer.max(1));

    let dispatcher = Dispatcher::new(descriptor.name.clone(), scope, reporter.clone());
    let actor = PanelActor::new(
        cmd_rx,
        dispatcher,
        descriptor.port.clone(),
        transport,
        reporter,
        settings.retry,
        cancel,
    );
    let task = tokio::spawn(actor.run());

    (PanelHandle::new(descriptor.name.clone(), cmd_tx), task)
}
