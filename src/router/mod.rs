//! Fan-out from a line source to every registered consumer
//!
//! 1. [`line_pump`] - Pulls lines from an external [`LineSource`] on a tokio task
//! 2. [`dispatcher`] - Parses each line and drops the bad ones
//! 3. [`input_router`] - Broadcasts samples to registered [`InputConsumer`]s
//!
//! # Architecture
//!
//! ```text
//! LineSource ──► LinePump ──► SerialLineDispatcher ──► InputRouter ──► consumers
//!                (task)       (parse + classify)       (snapshot broadcast)
//! ```
//!
//! There is one router per application, created at the composition root and
//! shared as `Arc<InputRouter>`. It owns at most one dispatcher, and a
//! dispatcher accepts at most one line source at a time.

pub mod dispatcher;
pub mod input_router;
pub mod line_pump;

pub use dispatcher::{DispatchStats, DispatcherError, SerialLineDispatcher};
pub use input_router::{InputConsumer, InputRouter};
pub use line_pump::{ChannelLineSource, LinePump, LineSource, PumpHandle, ReaderLineSource};
