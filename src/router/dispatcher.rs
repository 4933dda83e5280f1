use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Weak;
use tracing::{debug, error, warn};

use crate::input::line_parser::{parse_line, ParseError};
use crate::input::pin::PinSample;
use crate::router::input_router::InputRouter;

/// Errors that stop a dispatcher from pumping lines
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    /// No line source was provided at startup; the dispatcher disables itself
    #[error("No line source available, dispatcher disabled")]
    MissingLineSource,

    #[error("A line source is already attached to this dispatcher")]
    AlreadyRunning,

    #[error("Line source failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pump task failed: {0}")]
    TaskFailed(String),
}

/// Running counters, safe to read from any thread.
#[derive(Debug, Default)]
struct DispatchCounters {
    lines: AtomicU64,
    broadcast: AtomicU64,
    empty_line: AtomicU64,
    malformed_line: AtomicU64,
    invalid_pin_number: AtomicU64,
    invalid_value: AtomicU64,
    unknown_pin: AtomicU64,
}

/// Point-in-time copy of the dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub lines: u64,
    pub broadcast: u64,
    pub empty_line: u64,
    pub malformed_line: u64,
    pub invalid_pin_number: u64,
    pub invalid_value: u64,
    pub unknown_pin: u64,
}

impl DispatchStats {
    pub fn skipped(&self) -> u64 {
        self.empty_line
            + self.malformed_line
            + self.invalid_pin_number
            + self.invalid_value
            + self.unknown_pin
    }
}

/// Turns raw lines into samples and hands them to the router.
///
/// Holds no per-pin state. Every failure is per line: it gets logged, counted
/// and dropped, and the next line is handled normally.
#[derive(Debug)]
pub struct SerialLineDispatcher {
    router: Weak<InputRouter>,
    enabled: AtomicBool,
    source_attached: AtomicBool,
    counters: DispatchCounters,
}

impl SerialLineDispatcher {
    pub(crate) fn new(router: Weak<InputRouter>) -> Self {
        Self {
            router,
            enabled: AtomicBool::new(true),
            source_attached: AtomicBool::new(false),
            counters: DispatchCounters::default(),
        }
    }

    /// Handles one complete line. Returns the sample if it was broadcast.
    pub fn on_line(&self, line: &str) -> Option<PinSample> {
        if !self.is_enabled() {
            debug!("Dispatcher disabled, dropping line {:?}", line);
            return None;
        }
        self.counters.lines.fetch_add(1, Ordering::Relaxed);

        let sample = match parse_line(line) {
            Ok(sample) => sample,
            Err(e) => {
                self.record_skip(&e);
                if e.is_silent() {
                    debug!("Skipping line ({}): {}", e.kind(), e);
                } else {
                    warn!("Dropping line ({}): {}", e.kind(), e);
                }
                return None;
            }
        };

        let Some(router) = self.router.upgrade() else {
            error!("Router is gone, cannot broadcast {}={}", sample.pin, sample.value);
            return None;
        };

        let delivered = router.broadcast(sample);
        self.counters.broadcast.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Broadcast {}={:.3} to {} consumers",
            sample.pin, sample.value, delivered
        );
        Some(sample)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            lines: c.lines.load(Ordering::Relaxed),
            broadcast: c.broadcast.load(Ordering::Relaxed),
            empty_line: c.empty_line.load(Ordering::Relaxed),
            malformed_line: c.malformed_line.load(Ordering::Relaxed),
            invalid_pin_number: c.invalid_pin_number.load(Ordering::Relaxed),
            invalid_value: c.invalid_value.load(Ordering::Relaxed),
            unknown_pin: c.unknown_pin.load(Ordering::Relaxed),
        }
    }

    /// Claims the dispatcher for a line source; only one may be attached.
    pub(crate) fn attach_source(&self) -> Result<(), DispatcherError> {
        self.source_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| DispatcherError::AlreadyRunning)
    }

    pub(crate) fn detach_source(&self) {
        self.source_attached.store(false, Ordering::Release);
    }

    fn record_skip(&self, e: &ParseError) {
        let counter = match e {
            ParseError::EmptyLine => &self.counters.empty_line,
            ParseError::MalformedLine(_) => &self.counters.malformed_line,
            ParseError::InvalidPinNumber(_) => &self.counters.invalid_pin_number,
            ParseError::InvalidValue(_) => &self.counters.invalid_value,
            ParseError::UnknownPin(_) => &self.counters.unknown_pin,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
