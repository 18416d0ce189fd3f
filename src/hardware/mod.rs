//! Serial link to the output microcontroller
//!
//! The board accepts one ASCII command per state change (`"13 1"`) and never
//! acknowledges. The synchronizer talks to it through [`OutputDriver`] so the
//! rest of the system works unchanged when the device is missing.

pub mod serial_driver;

pub use serial_driver::{OutputDriver, SerialDriver};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    /// The device was never opened or has been closed
    #[error("Serial device unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to open serial device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Serial write failed: {0}")]
    Write(#[from] std::io::Error),
}
