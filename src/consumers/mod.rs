//! Consumers that turn pin samples into higher level events
//!
//! - [`button`] - one pin, press / held / release events
//! - [`joystick`] - four pins combined into a direction vector
//!
//! Both register with the [`InputRouter`](crate::router::InputRouter), ignore
//! pins they are not bound to, and publish their events on a bounded tokio
//! mpsc channel without ever blocking the broadcasting thread.

pub mod button;
pub mod joystick;

pub use button::{ButtonConsumer, ButtonEvent, ButtonEventKind, ButtonSettings};
pub use joystick::{Direction, JoystickConsumer, JoystickEvent, JoystickPins};
