//! Driver errors

use core::fmt;

/// Errors returned by the timer and serial drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Operation attempted before `init`
    NotInitialized,
    /// Every event slot is already registered
    CapacityExceeded,
    /// The transmit job queue has no free slot
    QueueFull,
    /// Wrong execution context, repeated `init`, or a receive already pending
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotInitialized => f.write_str("driver not initialized"),
            Error::CapacityExceeded => f.write_str("event table capacity exceeded"),
            Error::QueueFull => f.write_str("transmit queue full"),
            Error::InvalidState => f.write_str("operation not valid in current state"),
        }
    }
}

/// Driver result
pub type Result<T> = core::result::Result<T, Error>;
