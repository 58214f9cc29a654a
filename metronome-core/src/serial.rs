//! DMA serial transfer engine
//!
//! Transmit: `write` hands a buffer straight to the TX DMA channel when it
//! is idle, otherwise queues it. The TX completion interrupt pops the next
//! job and restarts the channel immediately, or marks the channel idle
//! when nothing is left. Jobs go out strictly in FIFO order.
//!
//! Receive: single buffer, no queue. `read` arms one DMA receive; the RX
//! completion interrupt hands the filled buffer to the registered
//! [`RxHandler`]. Nothing is re-armed implicitly, so the handler has to
//! submit the next buffer itself.
//!
//! ```text
//!             write (idle)                 complete, queue empty
//!   Idle ─────────────────────▶ Transferring ───────────────────▶ Idle
//!                                  │   ▲
//!                                  └───┘ complete, next job started
//! ```

#![allow(unsafe_code)]

use core::cell::{Cell, RefCell};

use critical_section::{CriticalSection, Mutex};
use metronome_hal::context::{self, InterruptProbe};
use metronome_hal::{Callback, DmaChannel, SerialPort};
use portable_atomic::{AtomicBool, Ordering};

use crate::config::SerialConfig;
use crate::error::{Error, Result};
use crate::queue::JobQueue;

/// Default transmit queue depth
pub const DEFAULT_TX_QUEUE_DEPTH: usize = 16;

/// Receive completion handler
///
/// Called from interrupt context with the filled buffer and the number of
/// bytes received.
pub type RxHandler = fn(&'static mut [u8], usize);

/// One pending transmit request
///
/// Only the view is queued; the bytes stay where the caller put them. The
/// `'static` bound keeps them valid until the DMA engine is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitJob {
    data: &'static [u8],
}

impl TransmitJob {
    /// Wrap `data` as a job
    pub const fn new(data: &'static [u8]) -> Self {
        Self { data }
    }

    /// Bytes to send
    pub const fn data(&self) -> &'static [u8] {
        self.data
    }

    /// Number of bytes to send
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if there is nothing to send
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Peripherals owned by an armed engine
struct Hardware<P, D> {
    port: P,
    tx: D,
    rx: D,
}

impl<P: SerialPort, D: DmaChannel> Hardware<P, D> {
    fn transmit(&mut self, job: TransmitJob) {
        let dst = self.port.tx_register();
        // SAFETY: job data is 'static and `dst` is the port's data register.
        unsafe { self.tx.start_dma(job.data.as_ptr(), dst, job.len()) };
    }

    fn receive(&mut self, dst: *mut u8, len: usize) {
        let src = self.port.rx_register();
        // SAFETY: `dst` points into the 'static buffer held by the engine
        // until the RX completion handler gives it back.
        unsafe { self.rx.start_dma(src, dst, len) };
    }
}

/// Receive-side bookkeeping
struct Receive {
    buffer: Option<&'static mut [u8]>,
    handler: Option<RxHandler>,
}

/// DMA-backed serial transmit/receive engine
///
/// Intended to live in a `static` and be armed once with
/// [`init`](Self::init). `Q` is the transmit queue depth.
///
/// `write` is the only producer of the transmit queue and must be called
/// from normal context, never concurrently with itself.
pub struct SerialEngine<P, D, const Q: usize = DEFAULT_TX_QUEUE_DEPTH> {
    initialized: AtomicBool,
    tx_busy: AtomicBool,
    rx_busy: AtomicBool,
    tx_jobs: JobQueue<TransmitJob, Q>,
    hardware: Mutex<RefCell<Option<Hardware<P, D>>>>,
    receive: Mutex<RefCell<Receive>>,
    probe: Mutex<Cell<InterruptProbe>>,
}

impl<P, D, const Q: usize> SerialEngine<P, D, Q>
where
    P: SerialPort + Send + 'static,
    D: DmaChannel + Send + 'static,
{
    /// Create an inert engine
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            tx_busy: AtomicBool::new(false),
            rx_busy: AtomicBool::new(false),
            tx_jobs: JobQueue::new(),
            hardware: Mutex::new(RefCell::new(None)),
            receive: Mutex::new(RefCell::new(Receive {
                buffer: None,
                handler: None,
            })),
            probe: Mutex::new(Cell::new(context::thread_mode_only as InterruptProbe)),
        }
    }

    /// Arm the engine
    ///
    /// Configures the port, binds each DMA channel to its request line,
    /// installs the completion handlers and enables the port. The engine
    /// owns the peripherals from here on. Call once, before enabling
    /// interrupts.
    pub fn init(
        &'static self,
        mut port: P,
        mut tx: D,
        mut rx: D,
        config: SerialConfig,
    ) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            warn!("serial engine already initialized");
            return Err(Error::InvalidState);
        }

        port.configure(&config.uart);
        tx.configure_channel(config.tx_source);
        rx.configure_channel(config.rx_source);
        tx.set_completion_handler(Callback::new(Self::on_tx_complete, self));
        rx.set_completion_handler(Callback::new(Self::on_rx_complete, self));
        port.enable();

        critical_section::with(|cs| {
            self.probe.borrow(cs).set(config.interrupt_probe);
            self.hardware
                .borrow_ref_mut(cs)
                .replace(Hardware { port, tx, rx });
        });
        self.initialized.store(true, Ordering::Release);

        debug!(
            "serial engine armed: {=u32} baud, tx queue {=usize}",
            config.uart.baudrate,
            Q
        );
        Ok(())
    }

    /// Send `data`
    ///
    /// Starts the transfer right away if the transmitter is idle, otherwise
    /// queues it behind earlier writes. Returns once the data is handed off,
    /// not when it has been sent. Fails with [`Error::QueueFull`] when the
    /// queue has no room; the caller decides whether to retry or drop.
    pub fn write(&self, data: &'static [u8]) -> Result<()> {
        self.ensure_initialized()?;
        if self.in_interrupt() {
            warn!("serial write from interrupt context");
            return Err(Error::InvalidState);
        }
        if data.is_empty() {
            return Ok(());
        }

        let job = TransmitJob::new(data);
        critical_section::with(|cs| {
            if self.tx_busy.load(Ordering::Acquire) {
                return self.tx_jobs.enqueue(job).map_err(|_| {
                    warn!("tx queue full, dropping {=usize} byte write", job.len());
                    Error::QueueFull
                });
            }

            self.with_hardware(cs, |hw| hw.transmit(job))?;
            self.tx_busy.store(true, Ordering::Release);
            Ok(())
        })
    }

    /// Send a string, see [`write`](Self::write)
    pub fn write_str(&self, s: &'static str) -> Result<()> {
        self.write(s.as_bytes())
    }

    /// Install the receive completion handler
    pub fn set_rx_handler(&self, handler: RxHandler) {
        critical_section::with(|cs| self.receive.borrow_ref_mut(cs).handler = Some(handler));
    }

    /// Arm one DMA receive into `buffer`
    ///
    /// May be called from the receive handler to resubmit. Fails with
    /// [`Error::InvalidState`] while another receive is pending or if
    /// `buffer` is empty.
    pub fn read(&self, buffer: &'static mut [u8]) -> Result<()> {
        self.ensure_initialized()?;
        if buffer.is_empty() {
            return Err(Error::InvalidState);
        }

        critical_section::with(|cs| {
            if self.rx_busy.load(Ordering::Acquire) {
                return Err(Error::InvalidState);
            }

            let len = buffer.len();
            let dst = buffer.as_mut_ptr();
            self.with_hardware(cs, |hw| hw.receive(dst, len))?;
            self.receive.borrow_ref_mut(cs).buffer = Some(buffer);
            self.rx_busy.store(true, Ordering::Release);
            Ok(())
        })
    }

    /// TX completion handler, run from the DMA interrupt
    ///
    /// Starts the next queued job, or marks the transmitter idle.
    pub fn on_tx_complete(&self) {
        critical_section::with(|cs| match self.tx_jobs.dequeue() {
            Some(job) => {
                trace!("tx next job, {=usize} bytes", job.len());
                let started = self.with_hardware(cs, |hw| hw.transmit(job));
                debug_assert!(started.is_ok(), "tx completion on unarmed engine");
            }
            None => self.tx_busy.store(false, Ordering::Release),
        });
    }

    /// RX completion handler, run from the DMA interrupt
    ///
    /// Hands the filled buffer to the receive handler outside the critical
    /// section.
    pub fn on_rx_complete(&self) {
        let done = critical_section::with(|cs| {
            let mut receive = self.receive.borrow_ref_mut(cs);
            let buffer = receive.buffer.take()?;
            self.rx_busy.store(false, Ordering::Release);
            Some((buffer, receive.handler))
        });

        match done {
            Some((buffer, Some(handler))) => {
                let len = buffer.len();
                handler(buffer, len);
            }
            Some((_, None)) => warn!("rx complete without handler, buffer dropped"),
            None => debug_assert!(false, "rx completion without pending receive"),
        }
    }

    /// Whether a transmit is in progress
    pub fn is_tx_busy(&self) -> bool {
        self.tx_busy.load(Ordering::Acquire)
    }

    /// Whether a receive is pending
    pub fn is_rx_busy(&self) -> bool {
        self.rx_busy.load(Ordering::Acquire)
    }

    /// Number of writes waiting behind the active transfer
    pub fn pending(&self) -> usize {
        self.tx_jobs.len()
    }

    /// Whether [`init`](Self::init) has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn in_interrupt(&self) -> bool {
        let probe = critical_section::with(|cs| self.probe.borrow(cs).get());
        probe()
    }

    fn with_hardware(
        &self,
        cs: CriticalSection<'_>,
        f: impl FnOnce(&mut Hardware<P, D>),
    ) -> Result<()> {
        let mut hardware = self.hardware.borrow_ref_mut(cs);
        let hw = hardware.as_mut().ok_or(Error::NotInitialized)?;
        f(hw);
        Ok(())
    }
}

impl<P, D, const Q: usize> Default for SerialEngine<P, D, Q>
where
    P: SerialPort + Send + 'static,
    D: DmaChannel + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{leak, DmaState, MockDma, MockPort, PortState, Transfer};
    use metronome_hal::uart::Parity;
    use metronome_hal::UartConfig;
    use std::sync::Mutex as StdMutex;

    type Engine<const Q: usize> = SerialEngine<MockPort, MockDma, Q>;

    struct Rig<const Q: usize> {
        engine: &'static Engine<Q>,
        port: &'static PortState,
        tx: &'static DmaState,
        rx: &'static DmaState,
    }

    fn rig<const Q: usize>(config: SerialConfig) -> Rig<Q> {
        let engine: &'static Engine<Q> = leak(SerialEngine::new());
        let port = PortState::leak();
        let tx = DmaState::leak();
        let rx = DmaState::leak();
        engine
            .init(MockPort::new(port), MockDma::new(tx), MockDma::new(rx), config)
            .unwrap();
        Rig {
            engine,
            port,
            tx,
            rx,
        }
    }

    fn tx_transfer(port: &PortState, data: &'static [u8]) -> Transfer {
        Transfer {
            src: data.as_ptr() as usize,
            dst: port.tx_address(),
            len: data.len(),
        }
    }

    fn in_interrupt() -> bool {
        true
    }

    #[test]
    fn test_init_configures_peripherals() {
        let config = SerialConfig {
            uart: UartConfig {
                baudrate: 9_600,
                parity: Parity::Even,
                ..Default::default()
            },
            tx_source: 3,
            rx_source: 4,
            ..Default::default()
        };
        let r = rig::<4>(config);

        assert!(r.engine.is_initialized());
        assert_eq!(r.port.config(), Some(config.uart));
        assert!(r.port.is_enabled());
        assert_eq!(r.tx.source(), Some(3));
        assert_eq!(r.rx.source(), Some(4));
        assert!(r.tx.has_handler());
        assert!(r.rx.has_handler());
    }

    #[test]
    fn test_double_init_rejected() {
        let r = rig::<4>(SerialConfig::default());
        let again = r.engine.init(
            MockPort::new(PortState::leak()),
            MockDma::new(DmaState::leak()),
            MockDma::new(DmaState::leak()),
            SerialConfig::default(),
        );
        assert_eq!(again, Err(Error::InvalidState));
    }

    #[test]
    fn test_operations_before_init() {
        let engine: &'static Engine<4> = leak(SerialEngine::new());
        assert_eq!(engine.write(b"hi"), Err(Error::NotInitialized));

        let buffer: &'static mut [u8] = Box::leak(Box::new([0u8; 4]));
        assert_eq!(engine.read(buffer), Err(Error::NotInitialized));
    }

    #[test]
    fn test_write_while_idle_starts_immediately() {
        let r = rig::<4>(SerialConfig::default());
        static HELLO: &[u8] = b"hello\r\n";

        r.engine.write(HELLO).unwrap();

        assert!(r.engine.is_tx_busy());
        assert_eq!(r.engine.pending(), 0);
        assert_eq!(r.tx.transfers(), vec![tx_transfer(r.port, HELLO)]);
    }

    #[test]
    fn test_write_while_busy_is_queued_fifo() {
        let r = rig::<4>(SerialConfig::default());
        static FIRST: &[u8] = b"first";
        static SECOND: &[u8] = b"second";
        static THIRD: &[u8] = b"third";

        r.engine.write(FIRST).unwrap();
        r.engine.write(SECOND).unwrap();
        r.engine.write(THIRD).unwrap();

        assert_eq!(r.engine.pending(), 2);
        assert_eq!(r.tx.transfers().len(), 1);

        r.tx.complete();
        assert_eq!(r.tx.transfers().len(), 2);
        assert_eq!(r.engine.pending(), 1);

        r.tx.complete();
        r.tx.complete();

        assert!(!r.engine.is_tx_busy());
        assert_eq!(
            r.tx.transfers(),
            vec![
                tx_transfer(r.port, FIRST),
                tx_transfer(r.port, SECOND),
                tx_transfer(r.port, THIRD),
            ]
        );
    }

    #[test]
    fn test_completion_with_empty_queue_goes_idle() {
        let r = rig::<4>(SerialConfig::default());
        r.engine.write(b"x").unwrap();

        r.tx.complete();

        assert!(!r.engine.is_tx_busy());
        assert_eq!(r.tx.transfers().len(), 1);

        // Idle again, so the next write goes straight to the hardware.
        r.engine.write(b"y").unwrap();
        assert_eq!(r.tx.transfers().len(), 2);
        assert_eq!(r.engine.pending(), 0);
    }

    #[test]
    fn test_full_queue_reports_queue_full() {
        let r = rig::<3>(SerialConfig::default());

        r.engine.write(b"active").unwrap();
        for _ in 0..3 {
            r.engine.write(b"queued").unwrap();
        }

        assert_eq!(r.engine.write(b"overflow"), Err(Error::QueueFull));
        assert_eq!(r.engine.pending(), 3);

        // Draining one slot makes room again.
        r.tx.complete();
        assert_eq!(r.engine.write(b"retry"), Ok(()));
    }

    #[test]
    fn test_empty_write_is_ignored() {
        let r = rig::<4>(SerialConfig::default());
        r.engine.write(b"").unwrap();

        assert!(!r.engine.is_tx_busy());
        assert!(r.tx.transfers().is_empty());
    }

    #[test]
    fn test_write_str() {
        let r = rig::<4>(SerialConfig::default());
        static LOOP: &str = "loop\r\n";

        r.engine.write_str(LOOP).unwrap();

        assert_eq!(r.tx.transfers(), vec![tx_transfer(r.port, LOOP.as_bytes())]);
    }

    #[test]
    fn test_write_from_interrupt_rejected() {
        let r = rig::<4>(SerialConfig {
            interrupt_probe: in_interrupt,
            ..Default::default()
        });

        assert_eq!(r.engine.write(b"isr"), Err(Error::InvalidState));
        assert!(r.tx.transfers().is_empty());
    }

    static RECEIVED: StdMutex<Option<(usize, usize)>> = StdMutex::new(None);

    fn on_receive(buffer: &'static mut [u8], len: usize) {
        *RECEIVED.lock().unwrap() = Some((buffer.as_ptr() as usize, len));
    }

    #[test]
    fn test_receive_hands_back_buffer_without_rearm() {
        let r = rig::<4>(SerialConfig::default());
        r.engine.set_rx_handler(on_receive);

        let buffer: &'static mut [u8] = Box::leak(Box::new([0u8; 8]));
        let address = buffer.as_ptr() as usize;
        r.engine.read(buffer).unwrap();

        assert!(r.engine.is_rx_busy());
        assert_eq!(
            r.rx.transfers(),
            vec![Transfer {
                src: r.port.rx_address(),
                dst: address,
                len: 8,
            }]
        );

        r.rx.complete();

        assert!(!r.engine.is_rx_busy());
        assert_eq!(*RECEIVED.lock().unwrap(), Some((address, 8)));
        assert_eq!(r.rx.transfers().len(), 1);
    }

    #[test]
    fn test_read_while_pending_rejected() {
        let r = rig::<4>(SerialConfig::default());
        let first: &'static mut [u8] = Box::leak(Box::new([0u8; 4]));
        let second: &'static mut [u8] = Box::leak(Box::new([0u8; 4]));

        r.engine.read(first).unwrap();

        assert_eq!(r.engine.read(second), Err(Error::InvalidState));
        assert_eq!(r.rx.transfers().len(), 1);
    }

    #[test]
    fn test_empty_read_rejected() {
        let r = rig::<4>(SerialConfig::default());
        let empty: &'static mut [u8] = Box::leak(Box::new([0u8; 0]));

        assert_eq!(r.engine.read(empty), Err(Error::InvalidState));
        assert!(!r.engine.is_rx_busy());
    }

    #[test]
    fn test_receive_and_transmit_are_independent() {
        let r = rig::<4>(SerialConfig::default());
        let buffer: &'static mut [u8] = Box::leak(Box::new([0u8; 2]));

        r.engine.read(buffer).unwrap();
        r.engine.write(b"ping").unwrap();
        r.tx.complete();

        assert!(r.engine.is_rx_busy());
        assert!(!r.engine.is_tx_busy());
    }
}
