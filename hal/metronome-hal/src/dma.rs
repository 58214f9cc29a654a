//! DMA channel abstraction

#![allow(unsafe_code)]

use crate::Callback;

/// One DMA channel with a transfer-complete interrupt
///
/// Transfers are byte-wide. The channel is bound to a peripheral request
/// line once, then started repeatedly with new source/destination pairs.
pub trait DmaChannel {
    /// Route the peripheral request line `source_selector` to this channel
    ///
    /// Selector numbering is chip specific.
    fn configure_channel(&mut self, source_selector: u8);

    /// Install the function run from this channel's completion interrupt
    fn set_completion_handler(&mut self, handler: Callback);

    /// Start a transfer of `len` bytes from `src` to `dst`
    ///
    /// Returns as soon as the transfer is handed to the hardware. The
    /// completion handler runs when the last byte has moved.
    ///
    /// # Safety
    ///
    /// `src` must be readable and `dst` writable for `len` bytes (or be a
    /// peripheral data register) until the completion handler has run.
    unsafe fn start_dma(&mut self, src: *const u8, dst: *mut u8, len: usize);
}
