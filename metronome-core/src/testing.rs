//! Host-side mock peripherals
//!
//! Each mock is a thin handle around a leaked state block, so a test can
//! move the mock into a driver and keep inspecting (and driving) the
//! hardware through the state.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use metronome_hal::{Callback, DmaChannel, SerialPort, TickTimer, UartConfig};

/// Leak `value` to get the `'static` reference drivers expect
pub fn leak<T: 'static>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Shared state behind a [`MockTimer`]
#[derive(Default)]
pub struct TimerState {
    period_us: AtomicU32,
    running: AtomicBool,
    handler: Mutex<Option<Callback>>,
}

impl TimerState {
    pub fn leak() -> &'static Self {
        leak(Self::default())
    }

    /// Fire one tick interrupt
    pub fn tick(&self) {
        let handler = *self.handler.lock().unwrap();
        if let Some(handler) = handler {
            handler.invoke();
        }
    }

    pub fn ticks(&self, count: u32) {
        for _ in 0..count {
            self.tick();
        }
    }

    pub fn period_us(&self) -> u32 {
        self.period_us.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

pub struct MockTimer {
    state: &'static TimerState,
}

impl MockTimer {
    pub fn new(state: &'static TimerState) -> Self {
        Self { state }
    }
}

impl TickTimer for MockTimer {
    fn configure_periodic_tick(&mut self, period_us: u32) {
        self.state.period_us.store(period_us, Ordering::SeqCst);
    }

    fn register_tick_handler(&mut self, handler: Callback) {
        *self.state.handler.lock().unwrap() = Some(handler);
    }

    fn start(&mut self) {
        self.state.running.store(true, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// One transfer handed to a [`MockDma`], as raw addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub src: usize,
    pub dst: usize,
    pub len: usize,
}

/// Shared state behind a [`MockDma`]
#[derive(Default)]
pub struct DmaState {
    source: Mutex<Option<u8>>,
    handler: Mutex<Option<Callback>>,
    transfers: Mutex<Vec<Transfer>>,
}

impl DmaState {
    pub fn leak() -> &'static Self {
        leak(Self::default())
    }

    /// Fire the completion interrupt for the active transfer
    pub fn complete(&self) {
        let handler = *self.handler.lock().unwrap();
        if let Some(handler) = handler {
            handler.invoke();
        }
    }

    /// Every transfer started so far, oldest first
    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn source(&self) -> Option<u8> {
        *self.source.lock().unwrap()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

pub struct MockDma {
    state: &'static DmaState,
}

impl MockDma {
    pub fn new(state: &'static DmaState) -> Self {
        Self { state }
    }
}

impl DmaChannel for MockDma {
    fn configure_channel(&mut self, source_selector: u8) {
        *self.state.source.lock().unwrap() = Some(source_selector);
    }

    fn set_completion_handler(&mut self, handler: Callback) {
        *self.state.handler.lock().unwrap() = Some(handler);
    }

    #[allow(unsafe_code)]
    unsafe fn start_dma(&mut self, src: *const u8, dst: *mut u8, len: usize) {
        self.state.transfers.lock().unwrap().push(Transfer {
            src: src as usize,
            dst: dst as usize,
            len,
        });
    }
}

/// Shared state behind a [`MockPort`]
#[derive(Default)]
pub struct PortState {
    tx_data: u8,
    rx_data: u8,
    config: Mutex<Option<UartConfig>>,
    enabled: AtomicBool,
}

impl PortState {
    pub fn leak() -> &'static Self {
        leak(Self::default())
    }

    pub fn tx_address(&self) -> usize {
        &self.tx_data as *const u8 as usize
    }

    pub fn rx_address(&self) -> usize {
        &self.rx_data as *const u8 as usize
    }

    pub fn config(&self) -> Option<UartConfig> {
        *self.config.lock().unwrap()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

pub struct MockPort {
    state: &'static PortState,
}

impl MockPort {
    pub fn new(state: &'static PortState) -> Self {
        Self { state }
    }
}

impl SerialPort for MockPort {
    fn configure(&mut self, config: &UartConfig) {
        *self.state.config.lock().unwrap() = Some(*config);
    }

    fn enable(&mut self) {
        self.state.enabled.store(true, Ordering::SeqCst);
    }

    // Never written through; the mock DMA only records addresses.
    fn tx_register(&self) -> *mut u8 {
        (&self.state.tx_data as *const u8).cast_mut()
    }

    fn rx_register(&self) -> *const u8 {
        &self.state.rx_data
    }
}
