//! Panel actor - owns one panel's dispatcher and state store.
//!
//! Commands are processed one at a time, so dispatches for a panel never
//! interleave. Forwarding happens inside the command that produced the
//! update; a cancelled panel aborts any pending retry wait and stops.

use std::sync::Arc;

use panelbus_protocol::ForwardPayload;
use panelbus_transport::{write_with_retry, RetryPolicy, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::commands::{DispatchStats, PanelCommand, PanelStatus};
use crate::dispatch::{Dispatcher, Outcome};
use crate::reporter::{ReportEvent, Reporter};

/// The panel actor.
pub struct PanelActor {
    receiver: mpsc::Receiver<PanelCommand>,
    dispatcher: Dispatcher,
    port: String,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    stats: DispatchStats,
}

impl PanelActor {
    pub fn new(
        receiver: mpsc::Receiver<PanelCommand>,
        dispatcher: Dispatcher,
        port: impl Into<String>,
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn Reporter>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            dispatcher,
            port: port.into(),
            transport,
            reporter,
            retry,
            cancel,
            stats: DispatchStats::default(),
        }
    }

    /// Runs until cancelled or every handle is dropped.
    pub async fn run(mut self) {
        info!(panel = %self.dispatcher.panel(), port = %self.port, "Panel actor starting");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(panel = %self.dispatcher.panel(), "Panel actor cancelled");
                    break;
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                }
            }
        }

        info!(
            panel = %self.dispatcher.panel(),
            received = self.stats.received,
            applied = self.stats.applied,
            "Panel actor stopped"
        );
    }

    async fn handle_command(&mut self, cmd: PanelCommand) {
        match cmd {
            PanelCommand::Dispatch {
                source,
                line,
                respond_to,
            } => {
                let outcome = self.handle_dispatch(&source, &line).await;
                // Caller may have given up waiting
                let _ = respond_to.send(outcome);
            }
            PanelCommand::Submit { source, line } => {
                self.handle_dispatch(&source, &line).await;
            }
            PanelCommand::GetValue { signal, respond_to } => {
                let _ = respond_to.send(self.dispatcher.state().get(signal));
            }
            PanelCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.dispatcher.state().clone());
            }
            PanelCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    async fn handle_dispatch(&mut self, source: &str, line: &str) -> Outcome {
        self.stats.received += 1;
        let outcome = self.dispatcher.on_data_received(source, line);

        match &outcome {
            Outcome::Suppressed => self.stats.suppressed += 1,
            Outcome::Rejected(_) => self.stats.rejected += 1,
            Outcome::Applied(update) => {
                self.stats.applied += 1;
                self.forward(&update.payload).await;
            }
        }

        outcome
    }

    /// Writes the payload to the panel's port. A failure is reported but
    /// never rolls back the applied state.
    async fn forward(&mut self, payload: &ForwardPayload) {
        let panel = self.dispatcher.panel().to_string();

        let encoded = match payload.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                self.stats.forward_failures += 1;
                self.reporter.report(ReportEvent::ForwardFailed {
                    panel,
                    port: self.port.clone(),
                    error: format!("encode failed: {e}"),
                });
                return;
            }
        };

        match write_with_retry(
            self.transport.as_ref(),
            &self.port,
            &encoded,
            &self.retry,
            &self.cancel,
        )
        .await
        {
            Ok(attempts) => {
                self.stats.forwarded += 1;
                self.reporter.report(ReportEvent::Forwarded {
                    panel,
                    port: self.port.clone(),
                    payload: encoded,
                    attempts,
                });
            }
            Err(e) => {
                self.stats.forward_failures += 1;
                self.reporter.report(ReportEvent::ForwardFailed {
                    panel,
                    port: self.port.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn status(&self) -> PanelStatus {
        PanelStatus {
            panel: self.dispatcher.panel().to_string(),
            port: self.port.clone(),
            scope: self.dispatcher.scope().kind(),
            stored_signals: self.dispatcher.state().len(),
            last_resolved_signal: self.dispatcher.last_resolved_signal(),
            stats: self.stats,
        }
    }
}
