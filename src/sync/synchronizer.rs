use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::status::StatusSink;
use super::sync_handle::SyncAction;
use super::{Applied, SyncError};
use crate::hardware::{HardwareError, OutputDriver};
use crate::outputs::{Origin, OutputCommand, OutputRegistry, Pin, SerialCommand, UnknownOutput};

/// Lifecycle states of the synchronizer
#[state]
#[derive(Debug, Clone)]
pub enum SynchronizerState {
    Initializing, // Outputs declared, hardware untouched
    Running,      // Outputs forced low, serving actions
    Stopped,      // Hardware channel closed
}

/// Owner of the output registry and the hardware channel
#[machine]
pub struct Synchronizer<S: SynchronizerState> {
    registry: OutputRegistry,
    driver: Box<dyn OutputDriver>,
    default_sink: Option<Arc<dyn StatusSink>>,
    reset_gap: Duration,
}

impl<S: SynchronizerState> Synchronizer<S> {
    pub fn registry(&self) -> &OutputRegistry {
        &self.registry
    }
}

impl Synchronizer<Initializing> {
    pub fn create(
        registry: OutputRegistry,
        driver: Box<dyn OutputDriver>,
        default_sink: Option<Arc<dyn StatusSink>>,
        reset_gap: Duration,
    ) -> Self {
        info!(
            "Creating synchronizer for {} outputs (hardware {})",
            registry.len(),
            if driver.is_open() { "open" } else { "unavailable" }
        );
        Self::new(registry, driver, default_sink, reset_gap)
    }

    /// Forces every declared output low and starts serving
    pub async fn reset_outputs(mut self) -> Synchronizer<Running> {
        if !self.driver.is_open() {
            warn!("Hardware unavailable, outputs not reset");
            return self.transition();
        }
        if self.registry.is_empty() {
            warn!("No outputs declared, nothing to reset");
            return self.transition();
        }

        let pins: Vec<Pin> = self.registry.pins().collect();
        for pin in pins {
            if let Err(e) = self.driver.write_command(SerialCommand::reset(pin)).await {
                warn!("Failed to reset pin {}: {}", pin, e);
            }
            tokio::time::sleep(self.reset_gap).await;
        }

        info!("All {} outputs reset to 0", self.registry.len());
        self.transition()
    }
}

impl Synchronizer<Running> {
    /// Stores the requested state, drives the hardware and reports the status
    ///
    /// The registry is updated even when the hardware write does not happen;
    /// the returned error tells the caller the two have drifted apart.
    pub async fn apply(
        &mut self,
        command: &OutputCommand,
        reply_sink: Option<&Arc<dyn StatusSink>>,
    ) -> Result<Applied, SyncError> {
        let previous = self
            .registry
            .set(command.pin, command.state)
            .map_err(|UnknownOutput(pin)| SyncError::UnknownOutput(pin))?;

        let serial = command.serial();
        match self.driver.write_command(serial).await {
            Ok(()) => {
                info!("[{}] Executed: {}", command.origin, serial);
                debug!(
                    "Pin {} written {} ms after the request",
                    command.pin,
                    (Local::now() - command.issued_at).num_milliseconds()
                );
            }
            Err(HardwareError::Unavailable(device)) => {
                warn!(
                    "[{}] Hardware {} unavailable, {} not sent",
                    command.origin, device, serial
                );
                return Err(SyncError::HardwareUnavailable {
                    pin: command.pin,
                    state: command.state,
                });
            }
            Err(e) => {
                error!("[{}] Failed to execute {}: {}", command.origin, serial, e);
                return Err(SyncError::Hardware(e));
            }
        }

        let status_published = self.publish_status(command, reply_sink);
        Ok(Applied {
            pin: command.pin,
            state: command.state,
            previous,
            status_published,
        })
    }

    /// Applies the command only when it differs from the registry
    ///
    /// Returns `None` for a suppressed command. Our own status updates come
    /// back on the bus, so this check is what stops them from looping.
    pub async fn apply_if_changed(
        &mut self,
        command: &OutputCommand,
        reply_sink: Option<&Arc<dyn StatusSink>>,
    ) -> Option<Result<Applied, SyncError>> {
        match self.registry.get(command.pin) {
            None => Some(Err(SyncError::UnknownOutput(command.pin))),
            Some(current) if current == command.state => {
                debug!(
                    "[{}] Pin {} already at {}, ignoring",
                    command.origin, command.pin, current
                );
                None
            }
            Some(_) => Some(self.apply(command, reply_sink).await),
        }
    }

    /// Flips an output relative to its last known state
    pub async fn toggle(&mut self, pin: Pin, origin: Origin) -> Result<Applied, SyncError> {
        let current = self
            .registry
            .get(pin)
            .ok_or(SyncError::UnknownOutput(pin))?;
        let command = OutputCommand::new(pin, current.toggled(), origin);
        self.apply(&command, None).await
    }

    fn publish_status(
        &self,
        command: &OutputCommand,
        reply_sink: Option<&Arc<dyn StatusSink>>,
    ) -> bool {
        let Some(sink) = reply_sink.or(self.default_sink.as_ref()) else {
            debug!("No bus session, status of pin {} not published", command.pin);
            return false;
        };

        match sink.publish_status(command.pin, command.state) {
            Ok(()) => {
                debug!("Status of pin {} published: {}", command.pin, command.state);
                true
            }
            Err(e) => {
                warn!("Failed to publish status of pin {}: {}", command.pin, e);
                false
            }
        }
    }

    async fn handle_action(&mut self, action: SyncAction) {
        match action {
            SyncAction::Apply {
                command,
                reply_sink,
                response_tx,
            } => {
                let result = self.apply(&command, reply_sink.as_ref()).await;
                if response_tx.send(result).is_err() {
                    debug!("Apply requester went away");
                }
            }
            SyncAction::ApplyIfChanged {
                command,
                reply_sink,
                response_tx,
            } => {
                let result = self.apply_if_changed(&command, reply_sink.as_ref()).await;
                if response_tx.send(result).is_err() {
                    debug!("Apply requester went away");
                }
            }
            SyncAction::Toggle {
                pin,
                origin,
                response_tx,
            } => {
                let result = self.toggle(pin, origin).await;
                if response_tx.send(result).is_err() {
                    debug!("Toggle requester went away");
                }
            }
            SyncAction::StateOf { pin, response_tx } => {
                let _ = response_tx.send(self.registry.get(pin));
            }
            SyncAction::Snapshot { response_tx } => {
                let _ = response_tx.send(self.registry.snapshot());
            }
        }
    }

    /// Serves actions one at a time until shutdown or until every handle is gone
    ///
    /// Actions still queued when shutdown is requested are dropped.
    pub async fn run_until_shutdown(
        mut self,
        mut actions: mpsc::Receiver<SyncAction>,
        shutdown: CancellationToken,
    ) -> Synchronizer<Stopped> {
        info!("Synchronizer running");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Synchronizer shutdown requested");
                    break;
                }
                action = actions.recv() => match action {
                    Some(action) => self.handle_action(action).await,
                    None => {
                        info!("All synchronizer handles dropped");
                        break;
                    }
                },
            }
        }

        self.driver.close().await;
        debug!("Final output states: {:?}", self.registry.snapshot());
        self.transition()
    }
}
