use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use super::HardwareError;
use crate::config::SerialConfig;
use crate::outputs::SerialCommand;

/// Write side of the hardware channel
#[async_trait]
pub trait OutputDriver: Send {
    fn is_open(&self) -> bool;

    async fn write_command(&mut self, command: SerialCommand) -> Result<(), HardwareError>;

    async fn close(&mut self);
}

/// [`OutputDriver`] over a `tokio-serial` stream
///
/// A driver whose port failed to open stays around in the unavailable state;
/// every write then reports [`HardwareError::Unavailable`].
pub struct SerialDriver {
    path: String,
    port: Option<SerialStream>,
}

impl SerialDriver {
    /// Opens the configured device and waits for the board to come out of reset
    pub async fn open(config: &SerialConfig) -> Self {
        match Self::try_open(config) {
            Ok(port) => {
                info!(
                    "Serial device {} opened at {} baud",
                    config.port, config.baud_rate
                );
                // Opening the port resets the board
                tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;
                Self {
                    path: config.port.clone(),
                    port: Some(port),
                }
            }
            Err(e) => {
                error!("{}", e);
                Self::unavailable(&config.port)
            }
        }
    }

    pub fn unavailable(path: &str) -> Self {
        Self {
            path: path.to_string(),
            port: None,
        }
    }

    fn try_open(config: &SerialConfig) -> Result<SerialStream, HardwareError> {
        tokio_serial::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open_native_async()
            .map_err(|source| HardwareError::Open {
                path: config.port.clone(),
                source,
            })
    }
}

#[async_trait]
impl OutputDriver for SerialDriver {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write_command(&mut self, command: SerialCommand) -> Result<(), HardwareError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| HardwareError::Unavailable(self.path.clone()))?;

        let line = command.to_line();
        port.write_all(line.as_bytes()).await?;
        port.flush().await?;
        debug!("Serial write to {}: {:?}", self.path, line);
        Ok(())
    }

    async fn close(&mut self) {
        match self.port.take() {
            Some(_) => info!("Serial device {} closed", self.path),
            None => warn!("Serial device {} was not open", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::Pin;

    #[tokio::test]
    async fn unavailable_driver_rejects_writes() {
        let mut driver = SerialDriver::unavailable("/dev/ttyUSB9");
        assert!(!driver.is_open());

        let result = driver.write_command(SerialCommand::reset(Pin(13))).await;
        assert!(matches!(result, Err(HardwareError::Unavailable(path)) if path == "/dev/ttyUSB9"));
    }

    #[tokio::test]
    async fn open_missing_device_degrades_to_unavailable() {
        let config = SerialConfig {
            port: "/dev/lightbridge-does-not-exist".to_string(),
            settle_ms: 0,
            ..SerialConfig::default()
        };
        let driver = SerialDriver::open(&config).await;
        assert!(!driver.is_open());
    }
}
