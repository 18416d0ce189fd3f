use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host; the bus listener is disabled without one
    pub broker: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Command filter with a single trailing wildcard segment for the pin
    pub command_topic: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: None,
            port: 1883,
            user: None,
            password: None,
            client_id: "lightbridge".to_string(),
            command_topic: "home/light/+".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_secs: 5,
            channel_capacity: 100,
        }
    }
}
