use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::status::StatusSink;
use super::synchronizer::{Initializing, Synchronizer};
use super::{Applied, SyncError};
use crate::outputs::{Origin, OutputCommand, Pin, PinState};

const ACTION_QUEUE_CAPACITY: usize = 32;

/// Requests served by the synchronizer task
pub enum SyncAction {
    Apply {
        command: OutputCommand,
        reply_sink: Option<Arc<dyn StatusSink>>,
        response_tx: oneshot::Sender<Result<Applied, SyncError>>,
    },
    ApplyIfChanged {
        command: OutputCommand,
        reply_sink: Option<Arc<dyn StatusSink>>,
        response_tx: oneshot::Sender<Option<Result<Applied, SyncError>>>,
    },
    Toggle {
        pin: Pin,
        origin: Origin,
        response_tx: oneshot::Sender<Result<Applied, SyncError>>,
    },
    StateOf {
        pin: Pin,
        response_tx: oneshot::Sender<Option<PinState>>,
    },
    Snapshot {
        response_tx: oneshot::Sender<Vec<(Pin, PinState)>>,
    },
}

/// Cloneable entry point to the synchronizer task
///
/// Both the bus listener and the chat handler hold one. Requests are queued
/// and served strictly in order.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncAction>,
}

impl SyncHandle {
    /// Resets the outputs and runs the synchronizer on its own task
    pub fn spawn(
        synchronizer: Synchronizer<Initializing>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);
        debug!(
            "Created synchronizer queue with capacity {}",
            ACTION_QUEUE_CAPACITY
        );

        let task = tokio::spawn(async move {
            let running = synchronizer.reset_outputs().await;
            let _stopped = running.run_until_shutdown(rx, shutdown).await;
            info!("Synchronizer stopped");
        });

        (Self { tx }, task)
    }

    async fn request<T>(
        &self,
        action: impl FnOnce(oneshot::Sender<T>) -> SyncAction,
    ) -> Result<T, SyncError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(action(response_tx))
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        response_rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn apply(
        &self,
        command: OutputCommand,
        reply_sink: Option<Arc<dyn StatusSink>>,
    ) -> Result<Applied, SyncError> {
        self.request(|response_tx| SyncAction::Apply {
            command,
            reply_sink,
            response_tx,
        })
        .await?
    }

    /// `Ok(None)` means the output was already in the requested state
    pub async fn apply_if_changed(
        &self,
        command: OutputCommand,
        reply_sink: Option<Arc<dyn StatusSink>>,
    ) -> Result<Option<Applied>, SyncError> {
        self.request(|response_tx| SyncAction::ApplyIfChanged {
            command,
            reply_sink,
            response_tx,
        })
        .await?
        .transpose()
    }

    pub async fn toggle(&self, pin: Pin, origin: Origin) -> Result<Applied, SyncError> {
        self.request(|response_tx| SyncAction::Toggle {
            pin,
            origin,
            response_tx,
        })
        .await?
    }

    pub async fn state_of(&self, pin: Pin) -> Result<Option<PinState>, SyncError> {
        self.request(|response_tx| SyncAction::StateOf { pin, response_tx })
            .await
    }

    pub async fn snapshot(&self) -> Result<Vec<(Pin, PinState)>, SyncError> {
        self.request(|response_tx| SyncAction::Snapshot { response_tx })
            .await
    }
}
