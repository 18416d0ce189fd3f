use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::config::OutputConfig;
use crate::outputs::Pin;

const BUTTONS_PER_ROW: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub name: String,
    pub pin: Pin,
}

/// Fixed label → output table behind the reply keyboard
#[derive(Debug, Clone)]
pub struct Menu {
    entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn from_outputs(outputs: &[OutputConfig]) -> Self {
        let entries = outputs
            .iter()
            .map(|output| MenuEntry {
                label: output.label.clone(),
                name: output.name.clone(),
                pin: output.pin,
            })
            .collect();
        Self { entries }
    }

    /// Exact match on the button text
    pub fn lookup(&self, text: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|entry| entry.label == text)
    }

    pub fn keyboard(&self) -> KeyboardMarkup {
        let rows: Vec<Vec<KeyboardButton>> = self
            .entries
            .chunks(BUTTONS_PER_ROW)
            .map(|row| {
                row.iter()
                    .map(|entry| KeyboardButton::new(entry.label.clone()))
                    .collect()
            })
            .collect();
        KeyboardMarkup::new(rows).resize_keyboard()
    }
}
