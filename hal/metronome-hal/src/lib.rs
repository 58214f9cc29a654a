//! Metronome Hardware Abstraction Layer
//!
//! This crate defines the narrow "peripheral control" surface the
//! Metronome drivers are written against. Chip support crates implement
//! these traits over their timer, DMA and UART registers; the drivers in
//! `metronome-core` never touch a register themselves.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / board support            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  metronome-core (EventTimer, Serial)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  metronome-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!            chip-specific impls
//! ```
//!
//! # Traits
//!
//! - [`timer::TickTimer`] - Periodic tick interrupt source
//! - [`dma::DmaChannel`] - One DMA channel with a completion interrupt
//! - [`uart::SerialPort`] - Serial peripheral fed by DMA
//!
//! Interrupt handlers are installed as [`Callback`] values, a function
//! pointer plus a `'static` context, so no allocation is needed to bind a
//! driver instance to its interrupt.

#![no_std]
#![deny(unsafe_code)]

pub mod callback;
pub mod context;
pub mod dma;
pub mod timer;
pub mod uart;

// Re-export key types at crate root for convenience
pub use callback::Callback;
pub use context::InterruptProbe;
pub use dma::DmaChannel;
pub use timer::TickTimer;
pub use uart::{SerialPort, UartConfig};
