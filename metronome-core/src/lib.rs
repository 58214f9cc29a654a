//! Interrupt-safe driver core for Metronome
//!
//! This crate contains the parts of the timer and serial drivers that run
//! on both sides of the interrupt boundary:
//!
//! - Event timer: a fixed table of software events driven by one
//!   periodic hardware tick
//! - Transmit job queue: lock-free single-producer/single-consumer queue
//!   of pending writes
//! - Serial engine: DMA transmit pipeline drained from the completion
//!   interrupt, plus a single-buffer DMA receive path
//!
//! Hardware is reached only through the `metronome-hal` traits. Nothing
//! allocates; every driver is built in `const` context so it can live in a
//! `static`, then armed with `init`.
//!
//! # Contexts
//!
//! There are exactly two: *normal* (the foreground loop) and *interrupt*.
//! Registration, start/stop and `write` belong to normal context and must
//! be called serially. Tick dispatch and DMA completion belong to interrupt
//! context. Shared state is atomics plus short critical sections; caller
//! callbacks never run inside a critical section.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod log;

pub mod config;
pub mod error;
pub mod queue;
pub mod serial;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::{SerialConfig, TimerConfig};
pub use error::{Error, Result};
pub use queue::JobQueue;
pub use serial::{RxHandler, SerialEngine, TransmitJob};
pub use timer::{Event, EventTimer, MAX_EVENTS};

pub use metronome_hal::Callback;
