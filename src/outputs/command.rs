use chrono::{DateTime, Local};
use std::fmt;

use super::registry::{Pin, PinState};

/// Channel a command arrived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Chat,
    Bus,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Chat => f.write_str("Telegram"),
            Origin::Bus => f.write_str("MQTT"),
        }
    }
}

/// Request to drive one output to a state
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCommand {
    pub pin: Pin,
    pub state: PinState,
    pub origin: Origin,
    pub issued_at: DateTime<Local>,
}

impl OutputCommand {
    pub fn new(pin: Pin, state: PinState, origin: Origin) -> Self {
        Self {
            pin,
            state,
            origin,
            issued_at: Local::now(),
        }
    }

    pub fn serial(&self) -> SerialCommand {
        SerialCommand {
            pin: self.pin,
            state: self.state,
        }
    }
}

/// Line written to the microcontroller, rendered as `"<pin> <state>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialCommand {
    pub pin: Pin,
    pub state: PinState,
}

impl SerialCommand {
    pub fn reset(pin: Pin) -> Self {
        Self {
            pin,
            state: PinState::Low,
        }
    }

    pub fn to_line(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SerialCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.pin, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_line_format() {
        let command = OutputCommand::new(Pin(13), PinState::High, Origin::Bus);
        assert_eq!(command.serial().to_line(), "13 1");
        assert_eq!(SerialCommand::reset(Pin(8)).to_line(), "8 0");
    }
}
