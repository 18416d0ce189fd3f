use chrono::NaiveDateTime;
use rumqttc::Publish;
use std::collections::BTreeSet;
use std::fmt;

use super::topics::TopicScheme;
use crate::outputs::{Origin, OutputCommand, Pin, PinState};

const PREVIEW_LEN: usize = 10;

/// Inbound bus message as received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    topic: String,
    content: String,
    timestamp: NaiveDateTime,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content.chars().take(PREVIEW_LEN).collect();
        write!(f, "{} - {}: {}", self.timestamp, self.topic, preview)
    }
}

/// Why a bus message did not become a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StatusEcho,
    InvalidPayload,
    InvalidTopic,
    UnknownOutput(Pin),
}

impl MQTTMessage {
    pub fn from_topic(topic: String, content: String) -> Self {
        MQTTMessage {
            topic,
            content,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn from_publish(publish: &Publish) -> Self {
        let content = String::from_utf8_lossy(&publish.payload).into_owned();
        Self::from_topic(publish.topic.clone(), content)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Turns the message into a command for one of the known outputs
    pub fn to_command(&self, known_pins: &BTreeSet<Pin>) -> Result<OutputCommand, Rejection> {
        if TopicScheme::is_status_echo(&self.topic) {
            return Err(Rejection::StatusEcho);
        }

        let state = PinState::from_payload(self.content.trim()).ok_or(Rejection::InvalidPayload)?;
        let pin = TopicScheme::pin_from_topic(&self.topic).ok_or(Rejection::InvalidTopic)?;

        if !known_pins.contains(&pin) {
            return Err(Rejection::UnknownOutput(pin));
        }
        Ok(OutputCommand::new(pin, state, Origin::Bus))
    }
}
