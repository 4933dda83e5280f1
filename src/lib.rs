//! Bridges Arduino pin readings arriving as serial text lines to input consumers.
//!
//! ```text
//! line source ──► SerialLineDispatcher ──► InputRouter ──► ButtonConsumer / JoystickConsumer
//!                 (parse_line)             (broadcast)      (ButtonDebouncer)
//! ```

pub mod config;
pub mod consumers;
pub mod input;
pub mod router;

pub use config::BridgeConfig;
pub use input::{
    ButtonDebouncer, ButtonState, ParseError, PinIdentifier, PinSample, ProcessResult,
};
pub use router::{DispatcherError, InputConsumer, InputRouter, LineSource, PumpHandle};
