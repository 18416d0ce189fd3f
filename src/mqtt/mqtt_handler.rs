use std::time::Duration;

use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::listener::{BusListener, Handled};
use super::message_manager::MQTTMessage;
use super::topics::TopicScheme;

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
}

#[derive(Clone, Debug, Default)]
pub struct MQTTStatus {
    pub connection_state: ConnectionState,
    pub last_error: Option<String>,
    pub messages_received: usize,
    pub commands_applied: usize,
    pub messages_ignored: usize,
    pub commands_failed: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

impl MQTTStatus {
    fn record(&mut self, handled: &Handled) {
        self.messages_received += 1;
        self.last_activity = Some(chrono::Local::now());
        match handled {
            Handled::Applied(_) => self.commands_applied += 1,
            Handled::Rejected(_) | Handled::Unchanged => self.messages_ignored += 1,
            Handled::Failed(_) => self.commands_failed += 1,
        }
    }
}

/// Creates the client session for the configured broker
///
/// Nothing is sent until the returned event loop is polled.
pub fn create_session(config: &MqttConfig, broker: &str) -> (AsyncClient, EventLoop) {
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), broker, config.port);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    if let Some(user) = &config.user {
        mqtt_options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
    }
    AsyncClient::new(mqtt_options, config.channel_capacity)
}

/// Drives the broker connection and feeds commands to the [`BusListener`]
///
/// ```text
/// Disconnected ──poll──► Connecting ──ConnAck──► Subscribed
///      ▲                     │                        │
///      └─────────────────────┴──── connection error ──┘
/// ```
///
/// The subscription is issued on every ConnAck, so it survives reconnects.
pub struct MqttHandler {
    status: MQTTStatus,
    client: AsyncClient,
    eventloop: EventLoop,
    scheme: TopicScheme,
    listener: BusListener,
    reconnect_delay: Duration,
}

impl MqttHandler {
    pub fn new(
        config: &MqttConfig,
        client: AsyncClient,
        eventloop: EventLoop,
        listener: BusListener,
    ) -> Self {
        MqttHandler {
            status: MQTTStatus::default(),
            client,
            eventloop,
            scheme: TopicScheme::from_filter(&config.command_topic),
            listener,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> &MQTTStatus {
        &self.status
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.status.connection_state != state {
            debug!(
                "MQTT state {:?} -> {:?}",
                self.status.connection_state, state
            );
            self.status.connection_state = state;
        }
    }

    /// Polls the broker connection until shutdown
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("MQTT handler started for {}", self.scheme.command_filter());
        self.set_state(ConnectionState::Connecting);

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => self.on_connack(&ack),
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription to {} acknowledged", self.scheme.command_filter());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = MQTTMessage::from_publish(&publish);
                    let handled = self.listener.handle(&message).await;
                    self.status.record(&handled);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    self.status.last_error = Some(e.to_string());
                    self.set_state(ConnectionState::Disconnected);

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                    self.set_state(ConnectionState::Connecting);
                }
            }
        }

        self.disconnect().await;
        info!(
            "MQTT handler stopped ({} received, {} applied, {} ignored, {} failed)",
            self.status.messages_received,
            self.status.commands_applied,
            self.status.messages_ignored,
            self.status.commands_failed
        );
    }

    fn on_connack(&mut self, ack: &ConnAck) {
        if ack.code != ConnectReturnCode::Success {
            error!("MQTT connection refused: {:?}", ack.code);
            self.status.last_error = Some(format!("{:?}", ack.code));
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        info!("Connected to MQTT broker");
        match self
            .client
            .try_subscribe(self.scheme.command_filter(), QoS::AtMostOnce)
        {
            Ok(()) => {
                info!("Subscribed to {}", self.scheme.command_filter());
                self.set_state(ConnectionState::Subscribed);
            }
            Err(e) => {
                warn!("Failed to subscribe to {}: {}", self.scheme.command_filter(), e);
                self.status.last_error = Some(e.to_string());
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.status.connection_state == ConnectionState::Disconnected {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect not queued: {}", e);
            return;
        }

        let eventloop = &mut self.eventloop;
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!("MQTT disconnect did not complete in time");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}
