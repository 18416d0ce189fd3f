use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::message_manager::{MQTTMessage, Rejection};
use crate::outputs::Pin;
use crate::sync::{Applied, StatusSink, SyncError, SyncHandle};

/// What became of one inbound bus message
#[derive(Debug)]
pub enum Handled {
    Rejected(Rejection),
    /// Output was already in the requested state
    Unchanged,
    Applied(Applied),
    Failed(SyncError),
}

/// Turns bus commands into synchronizer requests
///
/// Status updates triggered by bus commands go out through the listener's own
/// session so they are acknowledged on the connection that asked.
pub struct BusListener {
    known_pins: BTreeSet<Pin>,
    sync: SyncHandle,
    reply_sink: Arc<dyn StatusSink>,
}

impl BusListener {
    pub fn new(
        known_pins: impl IntoIterator<Item = Pin>,
        sync: SyncHandle,
        reply_sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            known_pins: known_pins.into_iter().collect(),
            sync,
            reply_sink,
        }
    }

    pub async fn handle(&self, message: &MQTTMessage) -> Handled {
        let command = match message.to_command(&self.known_pins) {
            Ok(command) => command,
            Err(rejection) => {
                debug!("Ignoring bus message {} ({:?})", message, rejection);
                return Handled::Rejected(rejection);
            }
        };

        match self
            .sync
            .apply_if_changed(command, Some(self.reply_sink.clone()))
            .await
        {
            Ok(Some(applied)) => {
                info!("Bus set pin {} to {}", applied.pin, applied.state);
                Handled::Applied(applied)
            }
            Ok(None) => Handled::Unchanged,
            Err(e) => {
                warn!("Bus command on {} failed: {}", message.topic(), e);
                Handled::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::{Origin, PinState};
    use crate::sync::testing::{spawn_handle, MockDriver, RecordingSink};

    fn message(topic: &str, content: &str) -> MQTTMessage {
        MQTTMessage::from_topic(topic.to_string(), content.to_string())
    }

    fn listener(sync: SyncHandle, reply: Arc<RecordingSink>) -> BusListener {
        BusListener::new([Pin(13), Pin(12), Pin(8), Pin(9)], sync, reply)
    }

    #[tokio::test]
    async fn bus_command_drives_hardware_and_reports_status() {
        let (driver, probe) = MockDriver::open();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());

        let handled = listener.handle(&message("home/light/13", "1")).await;

        assert!(matches!(handled, Handled::Applied(Applied { pin: Pin(13), .. })));
        assert_eq!(probe.writes().last().map(String::as_str), Some("13 1"));
        assert_eq!(reply.published(), vec![(Pin(13), PinState::High)]);
        assert_eq!(sync.state_of(Pin(13)).await.unwrap(), Some(PinState::High));
    }

    #[tokio::test]
    async fn repeated_state_is_not_echoed() {
        let (driver, probe) = MockDriver::open();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());

        listener.handle(&message("home/light/12", "1")).await;
        let writes_after_first = probe.writes().len();

        for payload in ["1", "1", " 1 "] {
            let handled = listener.handle(&message("home/light/12", payload)).await;
            assert!(matches!(handled, Handled::Unchanged));
        }

        assert_eq!(probe.writes().len(), writes_after_first);
        assert_eq!(reply.published().len(), 1);
    }

    #[tokio::test]
    async fn chat_change_is_not_reapplied_from_bus() {
        let (driver, probe) = MockDriver::open();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());

        sync.toggle(Pin(8), Origin::Chat).await.unwrap();
        let writes = probe.writes().len();

        let handled = listener.handle(&message("home/light/8", "1")).await;
        assert!(matches!(handled, Handled::Unchanged));
        assert_eq!(probe.writes().len(), writes);
        assert!(reply.published().is_empty());
    }

    #[tokio::test]
    async fn unknown_output_never_reaches_hardware() {
        let (driver, probe) = MockDriver::open();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());
        let before = sync.snapshot().await.unwrap();
        let writes = probe.writes().len();

        for topic in ["home/light/7", "home/light/0", "home/light/255"] {
            let handled = listener.handle(&message(topic, "1")).await;
            assert!(matches!(
                handled,
                Handled::Rejected(Rejection::UnknownOutput(_))
            ));
        }

        assert_eq!(sync.snapshot().await.unwrap(), before);
        assert_eq!(probe.writes().len(), writes);
    }

    #[tokio::test]
    async fn status_echo_and_garbage_are_dropped() {
        let (driver, _probe) = MockDriver::open();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());

        assert!(matches!(
            listener.handle(&message("home/light/13/status", "1")).await,
            Handled::Rejected(Rejection::StatusEcho)
        ));
        assert!(matches!(
            listener.handle(&message("home/light/13", "toggle")).await,
            Handled::Rejected(Rejection::InvalidPayload)
        ));
        assert!(matches!(
            listener.handle(&message("home/light/x", "1")).await,
            Handled::Rejected(Rejection::InvalidTopic)
        ));
        assert_eq!(sync.state_of(Pin(13)).await.unwrap(), Some(PinState::Low));
    }

    #[tokio::test]
    async fn hardware_outage_is_reported_as_failure() {
        let (driver, _probe) = MockDriver::closed();
        let reply = RecordingSink::new();
        let (sync, _shutdown, _task) = spawn_handle(driver, None);
        let listener = listener(sync.clone(), reply.clone());

        let handled = listener.handle(&message("home/light/9", "1")).await;

        assert!(matches!(
            handled,
            Handled::Failed(SyncError::HardwareUnavailable { .. })
        ));
        assert!(reply.published().is_empty());
        assert_eq!(sync.state_of(Pin(9)).await.unwrap(), Some(PinState::High));
    }
}
