use chrono::{DateTime, Local};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::input::debouncer::{ButtonDebouncer, ProcessResult, DEFAULT_PRESS_THRESHOLD};
use crate::input::pin::PinIdentifier;
use crate::router::input_router::InputConsumer;

// What happened to a button
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonEventKind {
    Pressed,
    /// Level stayed on past the hold threshold; repeats on every sample
    Held { held_ms: u64 },
    Released { held_ms: u64 },
}

#[derive(Clone, Debug)]
pub struct ButtonEvent {
    pub name: String,
    pub pin: PinIdentifier,
    pub kind: ButtonEventKind,
    pub timestamp: DateTime<Local>,
}

#[derive(Clone, Debug)]
pub struct ButtonSettings {
    pub press_threshold: f32,
    /// Minimum time since the press edge before Held is reported
    pub hold_threshold_ms: u64,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            press_threshold: DEFAULT_PRESS_THRESHOLD,
            hold_threshold_ms: 300,
        }
    }
}

#[derive(Debug)]
struct ButtonInner {
    debouncer: ButtonDebouncer,
    pressed_at: Option<DateTime<Local>>,
    last_result: Option<ProcessResult>,
}

/// Single button bound to one pin.
///
/// The debouncer only reports edges. Held is derived here from the time
/// since the press edge while the level stays on.
#[derive(Debug)]
pub struct ButtonConsumer {
    name: String,
    pin: PinIdentifier,
    hold_threshold_ms: u64,
    inner: Mutex<ButtonInner>,
    events: mpsc::Sender<ButtonEvent>,
}

impl ButtonConsumer {
    pub fn new(
        name: impl Into<String>,
        pin: PinIdentifier,
        settings: ButtonSettings,
        events: mpsc::Sender<ButtonEvent>,
    ) -> Self {
        let name = name.into();
        debug!(
            "Creating button '{}' on {} with settings: {:?}",
            name, pin, settings
        );
        Self {
            name,
            pin,
            hold_threshold_ms: settings.hold_threshold_ms,
            inner: Mutex::new(ButtonInner {
                debouncer: ButtonDebouncer::new(settings.press_threshold),
                pressed_at: None,
                last_result: None,
            }),
            events,
        }
    }

    pub fn pin(&self) -> PinIdentifier {
        self.pin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_result(&self) -> Option<ProcessResult> {
        self.lock_inner().last_result
    }

    pub fn set_press_threshold(&self, threshold: f32) {
        self.lock_inner().debouncer.set_press_threshold(threshold);
    }

    pub fn simulate_press(&self) -> ProcessResult {
        self.feed(1.0)
    }

    pub fn simulate_release(&self) -> ProcessResult {
        self.feed(0.0)
    }

    /// Clears the debouncer and any press in progress without emitting events.
    pub fn reset(&self) -> ProcessResult {
        let mut inner = self.lock_inner();
        let result = inner.debouncer.reset();
        inner.pressed_at = None;
        inner.last_result = Some(result);
        result
    }

    fn feed(&self, value: f32) -> ProcessResult {
        let now = Local::now();
        let (result, kind) = {
            let mut inner = self.lock_inner();
            let result = inner.debouncer.process_input(value);
            inner.last_result = Some(result);

            let kind = if result.was_pressed {
                inner.pressed_at = Some(now);
                Some(ButtonEventKind::Pressed)
            } else if result.was_released {
                let held_ms = inner
                    .pressed_at
                    .take()
                    .map(|at| elapsed_ms(at, now))
                    .unwrap_or(0);
                Some(ButtonEventKind::Released { held_ms })
            } else if result.is_sustained_press() {
                inner
                    .pressed_at
                    .map(|at| elapsed_ms(at, now))
                    .filter(|held_ms| *held_ms >= self.hold_threshold_ms)
                    .map(|held_ms| ButtonEventKind::Held { held_ms })
            } else {
                None
            };
            (result, kind)
        };

        if let Some(kind) = kind {
            self.emit(kind, now);
        }
        result
    }

    fn emit(&self, kind: ButtonEventKind, timestamp: DateTime<Local>) {
        match &kind {
            ButtonEventKind::Held { .. } => debug!("Button '{}' {:?}", self.name, kind),
            _ => info!(
                "Button '{}' ({}) {:?} at {}",
                self.name,
                self.pin,
                kind,
                timestamp.format("%H:%M:%S.%3f")
            ),
        }

        let event = ButtonEvent {
            name: self.name.clone(),
            pin: self.pin,
            kind,
            timestamp,
        };
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {:?}", event.kind);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Nobody listens to button '{}' anymore", self.name);
            }
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, ButtonInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputConsumer for ButtonConsumer {
    fn process_input(&self, pin: PinIdentifier, value: f32) {
        if pin == self.pin {
            self.feed(value);
        }
    }

    fn consumer_name(&self) -> &str {
        &self.name
    }
}

fn elapsed_ms(since: DateTime<Local>, now: DateTime<Local>) -> u64 {
    (now - since).num_milliseconds().max(0) as u64
}
