//! State synchronizer
//!
//! The only place that mutates output state. Every state change, whichever
//! channel it came from, goes through one actor task that owns the registry
//! and the serial driver, so at most one hardware write is in flight.
//!
//! ```text
//! MqttHandler ──┐                      ┌──► OutputRegistry
//!               ├─[SyncAction]──► Synchronizer ──► OutputDriver (serial)
//! ChatHandler ──┘   (mpsc/oneshot)     └──► StatusSink (retained status)
//! ```
//!
//! Lifecycle: `Initializing` (outputs declared) → `Running` (outputs reset
//! low, serving actions) → `Stopped` (driver closed).

pub mod status;
pub mod sync_handle;
pub mod synchronizer;

#[cfg(test)]
pub mod testing;

pub use status::{PublishError, StatusSink};
pub use sync_handle::{SyncAction, SyncHandle};
pub use synchronizer::{Synchronizer, SynchronizerState};

use crate::hardware::HardwareError;
use crate::outputs::{Pin, PinState};
use thiserror::Error;

/// Result of a state change that reached the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub pin: Pin,
    pub state: PinState,
    pub previous: PinState,
    /// False when the bus status update could not be sent
    pub status_published: bool,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Unknown output: pin {0}")]
    UnknownOutput(Pin),

    /// Registry was updated but the hardware never saw the change
    #[error("Hardware unavailable, pin {pin} set to {state} in registry only")]
    HardwareUnavailable { pin: Pin, state: PinState },

    #[error("Hardware write failed: {0}")]
    Hardware(#[source] HardwareError),

    #[error("Synchronizer is not running")]
    ChannelClosed,
}
