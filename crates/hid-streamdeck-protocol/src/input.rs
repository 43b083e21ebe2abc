//! Key state tracking from input reports

use serde::{Deserialize, Serialize};

use crate::MAX_KEYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "camelCase")]
pub enum KeyEvent {
    Down(usize),
    Up(usize),
}

impl KeyEvent {
    pub fn key(&self) -> usize {
        match *self {
            KeyEvent::Down(key) | KeyEvent::Up(key) => key,
        }
    }
}

/// Pressed-key bitmask for one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    pressed: u32,
    key_count: usize,
}

impl KeyState {
    /// `key_count` is clamped to the 32 keys the mask can hold.
    pub fn new(key_count: usize) -> Self {
        Self {
            pressed: 0,
            key_count: key_count.min(MAX_KEYS),
        }
    }

    /// Fold one input report into the state and return the transitions, in
    /// ascending key order.
    ///
    /// The first byte is the report id and the last is padding; both are
    /// dropped. Key `i` is pressed when byte `i` of what remains is non-zero.
    /// Keys beyond the end of a short report read as released.
    pub fn apply_report(&mut self, report: &[u8]) -> Vec<KeyEvent> {
        let keys = report
            .get(1..report.len().saturating_sub(1))
            .unwrap_or_default();

        let mut events = Vec::new();
        for key in 0..self.key_count {
            let bit = 1u32 << key;
            let now = keys.get(key).is_some_and(|&b| b != 0);
            let was = self.pressed & bit != 0;
            if now != was {
                self.pressed ^= bit;
                events.push(if now {
                    KeyEvent::Down(key)
                } else {
                    KeyEvent::Up(key)
                });
            }
        }
        events
    }

    pub fn is_pressed(&self, key: usize) -> bool {
        key < self.key_count && self.pressed & (1u32 << key) != 0
    }

    pub fn pressed_keys(&self) -> Vec<usize> {
        (0..self.key_count).filter(|&k| self.is_pressed(k)).collect()
    }

    pub fn bits(&self) -> u32 {
        self.pressed
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }
}
