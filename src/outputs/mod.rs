//! Output model shared by every channel
//!
//! An output is one relay or LED line on the microcontroller, addressed by its
//! pin number. The registry holds the last state that was sent to hardware and
//! is only ever mutated by the synchronizer.
//!
//! ```text
//! Chat ──┐
//!        ├──► OutputCommand ──► Synchronizer ──► OutputRegistry
//! MQTT ──┘                                  └──► SerialCommand
//! ```

pub mod command;
pub mod registry;

pub use command::{Origin, OutputCommand, SerialCommand};
pub use registry::{OutputRegistry, Pin, PinState, UnknownOutput};
