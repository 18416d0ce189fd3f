//! Startup configuration
//!
//! Built-in defaults, then an optional TOML file, then environment variables
//! (a `.env` file is loaded by `main` before this runs). Loaded once, never
//! reloaded.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mqtt::config::MqttConfig;
use crate::outputs::Pin;

const CONFIG_DIR: &str = "lightbridge";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_PATH_VAR: &str = "LIGHTBRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub mqtt: MqttConfig,
    pub serial: SerialConfig,
    pub outputs: Vec<OutputConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            mqtt: MqttConfig::default(),
            serial: SerialConfig::default(),
            outputs: default_outputs(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; the chat channel stays off without one
    pub token: Option<String>,
    /// Telegram user ids allowed to talk to the bot
    pub allowed_users: Vec<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Delay after opening while the board reboots
    pub settle_ms: u64,
    /// Gap between the per-output reset writes at startup
    pub reset_gap_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
            settle_ms: 2000,
            reset_gap_ms: 50,
        }
    }
}

/// One controllable output and how it shows up in the chat menu
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OutputConfig {
    pub pin: Pin,
    /// Button text, matched exactly against incoming chat messages
    pub label: String,
    /// Name used in confirmation replies
    pub name: String,
}

impl OutputConfig {
    fn new(pin: u8, label: &str, name: &str) -> Self {
        Self {
            pin: Pin(pin),
            label: label.to_string(),
            name: name.to_string(),
        }
    }
}

fn default_outputs() -> Vec<OutputConfig> {
    vec![
        OutputConfig::new(13, "🍳 Кухня", "Кухня"),
        OutputConfig::new(12, "🛁 Ванна", "Ванна"),
        OutputConfig::new(8, "🚽 Туалет", "Туалет"),
        OutputConfig::new(9, "🛏 Кімната", "Кімната"),
    ]
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// An explicit `LIGHTBRIDGE_CONFIG` path must exist; the default
    /// location is optional
    fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = lookup(CONFIG_PATH_VAR).filter(|value| !value.trim().is_empty());

        let mut config = match (explicit, default_config_path()) {
            (Some(path), _) => {
                let path = PathBuf::from(path);
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            (None, Some(path)) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            (None, Some(path)) => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            (None, None) => {
                warn!("Unable to determine config directory, using defaults");
                Self::default()
            }
        };

        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlays environment variables on top of the file configuration
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = var("BOT_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(users) = var("ALLOWED_USERS") {
            self.telegram.allowed_users = parse_user_list(&users);
        }
        if let Some(broker) = var("MQTT_BROKER") {
            self.mqtt.broker = Some(broker);
        }
        if let Some(port) = var("MQTT_PORT") {
            self.mqtt.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "MQTT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(user) = var("MQTT_USER") {
            self.mqtt.user = Some(user);
        }
        if let Some(password) = var("MQTT_PASS") {
            self.mqtt.password = Some(password);
        }
        if let Some(port) = var("SERIAL_PORT") {
            self.serial.port = port;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outputs.is_empty() {
            return Err(ConfigError::Invalid("no outputs configured".to_string()));
        }

        let mut pins = HashSet::new();
        let mut labels = HashSet::new();
        for output in &self.outputs {
            if !pins.insert(output.pin) {
                return Err(ConfigError::Invalid(format!(
                    "pin {} declared twice",
                    output.pin
                )));
            }
            if !labels.insert(output.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "menu label {:?} used twice",
                    output.label
                )));
            }
        }

        if !self.mqtt.command_topic.ends_with("/+") {
            return Err(ConfigError::Invalid(format!(
                "command topic {:?} must end with a single-level wildcard",
                self.mqtt.command_topic
            )));
        }
        Ok(())
    }

    pub fn pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.outputs.iter().map(|output| output.pin)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    Some(path)
}

/// Parses `"123, 456"` into user ids, skipping entries that are not plain numbers
pub fn parse_user_list(raw: &str) -> Vec<u64> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && entry.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|entry| entry.parse().ok())
        .collect()
}
