//! Serial port abstractions
//!
//! The serial drivers move data with DMA, so the port itself only needs
//! to be configured, enabled, and to expose its data registers as DMA
//! endpoints.

/// Serial peripheral whose data registers are fed by DMA
pub trait SerialPort {
    /// Apply baud rate and frame format
    fn configure(&mut self, config: &UartConfig);

    /// Enable the transmitter and receiver, including their DMA requests
    fn enable(&mut self);

    /// Transmit data register, the destination of TX transfers
    fn tx_register(&self) -> *mut u8;

    /// Receive data register, the source of RX transfers
    fn rx_register(&self) -> *const u8;
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
