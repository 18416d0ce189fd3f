use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Pin number of a controllable output on the microcontroller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(pub u8);

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binary output level, encoded as `0`/`1` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinState {
    #[default]
    Low,
    High,
}

impl PinState {
    /// Parses a bus payload. Only the literals `0` and `1` are accepted.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "0" => Some(PinState::Low),
            "1" => Some(PinState::High),
            _ => None,
        }
    }

    pub fn as_payload(self) -> &'static str {
        match self {
            PinState::Low => "0",
            PinState::High => "1",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PinState::Low => PinState::High,
            PinState::High => PinState::Low,
        }
    }

    pub fn is_on(self) -> bool {
        self == PinState::High
    }
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown output: pin {0}")]
pub struct UnknownOutput(pub Pin);

/// Last-known state of every declared output
///
/// Outputs are declared once at startup with [`PinState::Low`] and are never
/// removed. Lookups on undeclared pins fail instead of inserting.
#[derive(Debug, Clone, Default)]
pub struct OutputRegistry {
    states: BTreeMap<Pin, PinState>,
}

impl OutputRegistry {
    pub fn new(pins: impl IntoIterator<Item = Pin>) -> Self {
        let states: BTreeMap<Pin, PinState> =
            pins.into_iter().map(|pin| (pin, PinState::Low)).collect();
        debug!("Declared {} outputs: {:?}", states.len(), states.keys());
        Self { states }
    }

    pub fn contains(&self, pin: Pin) -> bool {
        self.states.contains_key(&pin)
    }

    pub fn get(&self, pin: Pin) -> Option<PinState> {
        self.states.get(&pin).copied()
    }

    /// Stores a new state and returns the previous one
    pub fn set(&mut self, pin: Pin, state: PinState) -> Result<PinState, UnknownOutput> {
        match self.states.get_mut(&pin) {
            Some(current) => Ok(std::mem::replace(current, state)),
            None => Err(UnknownOutput(pin)),
        }
    }

    pub fn pins(&self) -> impl Iterator<Item = Pin> + '_ {
        self.states.keys().copied()
    }

    pub fn snapshot(&self) -> Vec<(Pin, PinState)> {
        self.states.iter().map(|(pin, state)| (*pin, *state)).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
