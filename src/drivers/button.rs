//! Polled, debounced channel-select key.
//!
//! ## Hardware
//!
//! Active-low momentary switch (KEY1) with the internal pull-up enabled.
//! The main loop samples the level once per tick; no interrupt is used.
//!
//! ## Debounce rule
//!
//! A level change is honoured only if more than `debounce_ms` has passed
//! since the previously honoured change.  The clock starts at boot, so
//! contact bounce during power-up is ignored as well.  Only an honoured
//! falling edge (release → press) is reported.

use crate::scheduler::ticks_diff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed,
}

pub struct ModeKey {
    debounce_ms: u32,
    last_level_high: bool,
    last_change_ms: u32,
}

impl ModeKey {
    /// `initial_high` is the level sampled at boot.
    pub fn new(debounce_ms: u32, initial_high: bool, now_ms: u32) -> Self {
        Self {
            debounce_ms,
            last_level_high: initial_high,
            last_change_ms: now_ms,
        }
    }

    /// Feed the current level.  Returns [`KeyEvent::Pressed`] on an
    /// honoured falling edge.
    pub fn poll(&mut self, now_ms: u32, level_high: bool) -> Option<KeyEvent> {
        if level_high == self.last_level_high {
            return None;
        }
        if ticks_diff(now_ms, self.last_change_ms) <= self.debounce_ms as i32 {
            return None;
        }
        self.last_change_ms = now_ms;
        self.last_level_high = level_high;
        (!level_high).then_some(KeyEvent::Pressed)
    }

    pub fn is_pressed(&self) -> bool {
        !self.last_level_high
    }
}
