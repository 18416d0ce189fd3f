use rumqttc::{AsyncClient, QoS};
use tracing::info;

use super::topics::TopicScheme;
use crate::outputs::{Pin, PinState};
use crate::sync::{PublishError, StatusSink};

/// Publishes retained output status through an MQTT client session
#[derive(Clone)]
pub struct MqttStatusSink {
    client: AsyncClient,
    scheme: TopicScheme,
}

impl MqttStatusSink {
    pub fn new(client: AsyncClient, scheme: TopicScheme) -> Self {
        Self { client, scheme }
    }
}

impl StatusSink for MqttStatusSink {
    fn publish_status(&self, pin: Pin, state: PinState) -> Result<(), PublishError> {
        let topic = self.scheme.status_topic(pin);
        self.client
            .try_publish(topic.as_str(), QoS::AtMostOnce, true, state.as_payload())
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        info!("Status sent to {}: {}", topic, state);
        Ok(())
    }
}
