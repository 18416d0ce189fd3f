use thiserror::Error;

use crate::outputs::{Pin, PinState};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Status publish rejected: {0}")]
    Rejected(String),
}

/// Session used to report a new output state on the bus
///
/// Publishing must not block: implementations queue the message and return.
pub trait StatusSink: Send + Sync {
    fn publish_status(&self, pin: Pin, state: PinState) -> Result<(), PublishError>;
}
