//! Software event timer
//!
//! Multiplexes one periodic hardware tick into up to [`MAX_EVENTS`]
//! independent software events, each with its own interval and callback.

pub mod event;
pub mod scheduler;

pub use event::{Event, MAX_EVENTS};
pub use scheduler::EventTimer;
