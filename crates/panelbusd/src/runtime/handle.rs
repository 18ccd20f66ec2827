//! Client interface for a running `PanelActor`.
//!
//! Channel errors are mapped to `PanelError::ChannelClosed`; once a panel is
//! disconnected every call on an old handle fails that way.

use panelbus_core::{Oid, SignalValue, StateStore};
use tokio::sync::{mpsc, oneshot};

use super::commands::{PanelCommand, PanelError, PanelStatus};
use crate::dispatch::Outcome;

/// Cheap-to-clone handle to one panel actor.
#[derive(Debug, Clone)]
pub struct PanelHandle {
    name: String,
    sender: mpsc::Sender<PanelCommand>,
}

impl PanelHandle {
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<PanelCommand>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Qualified name of the panel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatches a line and waits for the outcome, forwarding included.
    ///
    /// # Errors
    ///
    /// - `PanelError::ChannelClosed` if the actor has stopped
    pub async fn dispatch(
        &self,
        source: impl Into<String>,
        line: impl Into<String>,
    ) -> Result<Outcome, PanelError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(PanelCommand::Dispatch {
                source: source.into(),
                line: line.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| PanelError::ChannelClosed)?;

        rx.await.map_err(|_| PanelError::ChannelClosed)
    }

    /// Queues a line without waiting for it to be processed.
    pub async fn submit(
        &self,
        source: impl Into<String>,
        line: impl Into<String>,
    ) -> Result<(), PanelError> {
        self.sender
            .send(PanelCommand::Submit {
                source: source.into(),
                line: line.into(),
            })
            .await
            .map_err(|_| PanelError::ChannelClosed)
    }

    pub async fn get_value(&self, signal: Oid) -> Result<Option<SignalValue>, PanelError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(PanelCommand::GetValue {
                signal,
                respond_to: tx,
            })
            .await
            .map_err(|_| PanelError::ChannelClosed)?;

        rx.await.map_err(|_| PanelError::ChannelClosed)
    }

    /// Copy of the panel's state store.
    pub async fn snapshot(&self) -> Result<StateStore, PanelError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(PanelCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| PanelError::ChannelClosed)?;

        rx.await.map_err(|_| PanelError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<PanelStatus, PanelError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(PanelCommand::Status { respond_to: tx })
            .await
            .map_err(|_| PanelError::ChannelClosed)?;

        rx.await.map_err(|_| PanelError::ChannelClosed)
    }

    /// Returns false once the actor has stopped.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
