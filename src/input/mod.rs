//! Input subsystem: from raw serial text to button edges
//!
//! 1. [`pin`] - Closed pin table and normalized samples
//! 2. [`line_parser`] - `<pin>#<value>` line parsing
//! 3. [`debouncer`] - Threshold based press/release state machine
//!
//! ```text
//! "4#1.0" ──► parse_line ──► PinSample { D4, 1.0 } ──► ButtonDebouncer ──► ProcessResult
//! ```

pub mod debouncer;
pub mod line_parser;
pub mod pin;

pub use debouncer::{ButtonDebouncer, ButtonState, ProcessResult, DEFAULT_PRESS_THRESHOLD};
pub use line_parser::{parse_line, ParseError, DELIMITER};
pub use pin::{parse_pin, PinIdentifier, PinSample};
