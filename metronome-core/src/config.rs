//! Driver configuration
//!
//! Plain `Copy` structs handed to `init`. Defaults match a 1 ms tick and a
//! 115200 8N1 serial line.

use metronome_hal::context::{self, InterruptProbe};
use metronome_hal::UartConfig;

/// Default tick period in microseconds (1 ms)
pub const DEFAULT_TICK_PERIOD_US: u32 = 1_000;

/// Event timer configuration
#[derive(Debug, Clone, Copy)]
pub struct TimerConfig {
    /// Hardware tick period in microseconds
    pub tick_period_us: u32,
    /// Detects calls from interrupt context
    pub interrupt_probe: InterruptProbe,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_period_us: DEFAULT_TICK_PERIOD_US,
            interrupt_probe: context::thread_mode_only,
        }
    }
}

/// Serial engine configuration
#[derive(Debug, Clone, Copy)]
pub struct SerialConfig {
    /// Line settings
    pub uart: UartConfig,
    /// DMA request line for the transmit channel
    pub tx_source: u8,
    /// DMA request line for the receive channel
    pub rx_source: u8,
    /// Detects calls from interrupt context
    pub interrupt_probe: InterruptProbe,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            uart: UartConfig::default(),
            tx_source: 0,
            rx_source: 0,
            interrupt_probe: context::thread_mode_only,
        }
    }
}
