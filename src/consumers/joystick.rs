//! Four buttons read as a digital joystick
//!
//! Each direction pin has its own debouncer. The stick position is the
//! difference of opposing buttons, so pressing up and down together cancels
//! out to the center.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::input::debouncer::{ButtonDebouncer, ButtonState};
use crate::input::pin::PinIdentifier;
use crate::router::input_router::InputConsumer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Maps a vector with components in {-1, 0, 1} to a compass direction.
    pub fn from_vector(x: i8, y: i8) -> Self {
        match (x.signum(), y.signum()) {
            (0, 1) => Direction::North,
            (1, 1) => Direction::NorthEast,
            (1, 0) => Direction::East,
            (1, -1) => Direction::SouthEast,
            (0, -1) => Direction::South,
            (-1, -1) => Direction::SouthWest,
            (-1, 0) => Direction::West,
            (-1, 1) => Direction::NorthWest,
            _ => Direction::Center,
        }
    }
}

/// Pins for the four directions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickPins {
    pub up: PinIdentifier,
    pub down: PinIdentifier,
    pub left: PinIdentifier,
    pub right: PinIdentifier,
}

#[derive(Clone, Debug)]
pub struct JoystickEvent {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub timestamp: DateTime<Local>,
}

const UP: usize = 0;
const DOWN: usize = 1;
const LEFT: usize = 2;
const RIGHT: usize = 3;

#[derive(Debug)]
struct JoystickInner {
    buttons: [ButtonDebouncer; 4],
    vector: (i8, i8),
}

#[derive(Debug)]
pub struct JoystickConsumer {
    name: String,
    pins: [PinIdentifier; 4],
    inner: Mutex<JoystickInner>,
    events: mpsc::Sender<JoystickEvent>,
}

impl JoystickConsumer {
    pub fn new(
        name: impl Into<String>,
        pins: JoystickPins,
        press_threshold: f32,
        events: mpsc::Sender<JoystickEvent>,
    ) -> Self {
        let name = name.into();
        debug!("Creating joystick '{}' with pins {:?}", name, pins);
        Self {
            name,
            pins: [pins.up, pins.down, pins.left, pins.right],
            inner: Mutex::new(JoystickInner {
                buttons: std::array::from_fn(|_| ButtonDebouncer::new(press_threshold)),
                vector: (0, 0),
            }),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current stick position as (x, y), each in {-1.0, 0.0, 1.0}
    pub fn vector(&self) -> (f32, f32) {
        let (x, y) = self.lock_inner().vector;
        (f32::from(x), f32::from(y))
    }

    pub fn direction(&self) -> Direction {
        let (x, y) = self.lock_inner().vector;
        Direction::from_vector(x, y)
    }

    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        for button in inner.buttons.iter_mut() {
            button.reset();
        }
        inner.vector = (0, 0);
    }

    fn lock_inner(&self) -> MutexGuard<'_, JoystickInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputConsumer for JoystickConsumer {
    fn process_input(&self, pin: PinIdentifier, value: f32) {
        if !self.pins.contains(&pin) {
            return;
        }

        let changed = {
            let mut inner = self.lock_inner();
            for (slot, bound) in self.pins.iter().enumerate() {
                if *bound == pin {
                    inner.buttons[slot].process_input(value);
                }
            }

            let on = |slot: usize| {
                i8::from(inner.buttons[slot].current_state() == ButtonState::Pressed)
            };
            let vector = (on(RIGHT) - on(LEFT), on(UP) - on(DOWN));
            if vector == inner.vector {
                None
            } else {
                inner.vector = vector;
                Some(vector)
            }
        };

        let Some((x, y)) = changed else {
            return;
        };

        let event = JoystickEvent {
            name: self.name.clone(),
            x: f32::from(x),
            y: f32::from(y),
            direction: Direction::from_vector(x, y),
            timestamp: Local::now(),
        };
        debug!(
            "Joystick '{}' moved to ({}, {}) {:?}",
            self.name, event.x, event.y, event.direction
        );
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            warn!("Event queue full, dropping joystick move {:?}", event.direction);
        }
    }

    fn consumer_name(&self) -> &str {
        &self.name
    }
}
