//! Edge-triggered button logic for a single logical input.
//!
//! A [`ButtonDebouncer`] turns a stream of normalized readings into discrete
//! press and release edges. It reports [`ButtonState::Pressed`] only on the
//! sample that crosses the threshold upwards and [`ButtonState::Released`] only
//! on the sample that crosses it downwards. A level that stays on produces no
//! further state change; callers that want "held" semantics layer them on top
//! (see [`crate::consumers::button`]).

use crate::input::pin::clamp_unit;

/// Default level above which a reading counts as "on".
pub const DEFAULT_PRESS_THRESHOLD: f32 = 0.5;

/// Last edge seen by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    /// No edge seen since creation or the last reset
    #[default]
    None,
    Pressed,
    Released,
}

/// Snapshot of one debouncer update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessResult {
    pub value_changed: bool,
    pub state_changed: bool,
    /// This update crossed the threshold upwards
    pub was_pressed: bool,
    /// This update crossed the threshold downwards
    pub was_released: bool,
    pub previous_state: ButtonState,
    pub current_state: ButtonState,
    pub previous_value: f32,
    pub current_value: f32,
}

impl ProcessResult {
    /// Level is still on and no edge happened in this update.
    pub fn is_sustained_press(&self) -> bool {
        !self.state_changed && self.current_state == ButtonState::Pressed
    }
}

#[derive(Debug, Clone)]
pub struct ButtonDebouncer {
    current_value: f32,
    previous_value: f32,
    current_state: ButtonState,
    press_threshold: f32,
}

impl Default for ButtonDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_PRESS_THRESHOLD)
    }
}

impl ButtonDebouncer {
    pub fn new(press_threshold: f32) -> Self {
        Self {
            current_value: 0.0,
            previous_value: 0.0,
            current_state: ButtonState::None,
            press_threshold: clamp_unit(press_threshold),
        }
    }

    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn previous_value(&self) -> f32 {
        self.previous_value
    }

    pub fn current_state(&self) -> ButtonState {
        self.current_state
    }

    pub fn press_threshold(&self) -> f32 {
        self.press_threshold
    }

    /// Only affects the next call to [`ButtonDebouncer::process_input`].
    pub fn set_press_threshold(&mut self, threshold: f32) {
        self.press_threshold = clamp_unit(threshold);
    }

    /// Feeds one reading and reports what changed.
    pub fn process_input(&mut self, value: f32) -> ProcessResult {
        self.previous_value = self.current_value;
        self.current_value = clamp_unit(value);

        let value_changed = self.current_value != self.previous_value;

        // Strict comparison: a value exactly at the threshold is off.
        let is_on = self.current_value > self.press_threshold;
        let was_on = self.previous_value > self.press_threshold;

        let previous_state = self.current_state;
        let mut was_pressed = false;
        let mut was_released = false;

        if is_on && !was_on {
            self.current_state = ButtonState::Pressed;
            was_pressed = true;
        } else if !is_on && was_on {
            self.current_state = ButtonState::Released;
            was_released = true;
        }

        ProcessResult {
            value_changed,
            state_changed: was_pressed || was_released,
            was_pressed,
            was_released,
            previous_state,
            current_state: self.current_state,
            previous_value: self.previous_value,
            current_value: self.current_value,
        }
    }

    /// Returns to the initial state. A second reset in a row reports no change.
    pub fn reset(&mut self) -> ProcessResult {
        let previous_state = self.current_state;
        let previous_value = self.current_value;

        self.current_value = 0.0;
        self.previous_value = 0.0;
        self.current_state = ButtonState::None;

        ProcessResult {
            value_changed: previous_value != self.current_value,
            state_changed: previous_state != self.current_state,
            was_pressed: false,
            was_released: false,
            previous_state,
            current_state: self.current_state,
            previous_value,
            current_value: self.current_value,
        }
    }

    pub fn simulate_press(&mut self) -> ProcessResult {
        self.process_input(1.0)
    }

    pub fn simulate_release(&mut self) -> ProcessResult {
        self.process_input(0.0)
    }
}
