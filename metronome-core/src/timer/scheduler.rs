//! Event registration and tick dispatch
//!
//! [`EventTimer`] is meant to live in a `static`. Normal context registers,
//! starts and stops events; the hardware tick interrupt runs
//! [`EventTimer::on_tick`], which counts every enabled event down and
//! calls the ones that are due.
//!
//! Callbacks run in interrupt context. Keep them short and never block in
//! them.

use core::cell::Cell;

use critical_section::Mutex;
use metronome_hal::context::{self, InterruptProbe};
use metronome_hal::{Callback, TickTimer};
use portable_atomic::{AtomicBool, Ordering};

use super::event::{Event, EventList, MAX_EVENTS};
use crate::config::TimerConfig;
use crate::error::{Error, Result};

/// Multi-event timer driven by one periodic hardware tick
///
/// `N` is the number of event slots, at most [`MAX_EVENTS`].
///
/// `register_event`, `start_event` and `stop_event` must be called from
/// normal context, one at a time. They may race only with the tick
/// interrupt. Calls detected in interrupt context fail with
/// [`Error::InvalidState`].
pub struct EventTimer<const N: usize = MAX_EVENTS> {
    initialized: AtomicBool,
    probe: Mutex<Cell<InterruptProbe>>,
    list: EventList<N>,
}

impl<const N: usize> EventTimer<N> {
    const CAPACITY_OK: () = assert!(
        N >= 1 && N <= MAX_EVENTS,
        "event timer capacity must be between 1 and 32"
    );

    /// Create an inert timer
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        Self {
            initialized: AtomicBool::new(false),
            probe: Mutex::new(Cell::new(context::thread_mode_only as InterruptProbe)),
            list: EventList::new(),
        }
    }

    /// Arm the timer
    ///
    /// Programs `timer` for the configured tick period, installs
    /// [`on_tick`](Self::on_tick) as its interrupt handler and starts it.
    /// Call once, before enabling interrupts.
    pub fn init<T: TickTimer>(&'static self, timer: &mut T, config: TimerConfig) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            warn!("event timer already initialized");
            return Err(Error::InvalidState);
        }

        critical_section::with(|cs| self.probe.borrow(cs).set(config.interrupt_probe));

        timer.configure_periodic_tick(config.tick_period_us);
        timer.register_tick_handler(Callback::new(Self::on_tick, self));
        self.initialized.store(true, Ordering::Release);
        timer.start();

        debug!(
            "event timer armed: {=usize} slots, tick {=u32} us",
            N,
            config.tick_period_us
        );
        Ok(())
    }

    /// Register an event that fires every `interval_ticks` ticks once started
    ///
    /// The event starts disabled. Fails with [`Error::CapacityExceeded`]
    /// when all slots are taken; slots are never released.
    pub fn register_event(&self, interval_ticks: u16, elapsed: Callback) -> Result<Event> {
        self.ensure_normal_context()?;

        let Some(slot) = self.list.allocate() else {
            warn!("event table full ({=usize} slots)", N);
            return Err(Error::CapacityExceeded);
        };

        // The slot is not enabled yet, so the tick handler ignores it.
        critical_section::with(|cs| {
            self.list
                .entry(cs, slot as usize)
                .assign(interval_ticks, elapsed)
        });

        debug!("event {=u8} registered, interval {=u16}", slot, interval_ticks);
        Ok(Event::new(slot))
    }

    /// Enable `event`, restarting its countdown from the full interval
    ///
    /// Starting a running event only restarts the countdown.
    pub fn start_event(&self, event: &Event) -> Result<()> {
        self.ensure_normal_context()?;
        self.ensure_registered(event)?;

        critical_section::with(|cs| {
            self.list.entry(cs, event.slot()).rearm();
            self.list.enable(event.mask());
        });
        Ok(())
    }

    /// Disable `event`
    ///
    /// A callback already dispatched by the tick handler still completes.
    /// The countdown is left as is and reset by the next start.
    pub fn stop_event(&self, event: &Event) -> Result<()> {
        self.ensure_normal_context()?;
        self.ensure_registered(event)?;

        self.list.disable(event.mask());
        Ok(())
    }

    /// Tick handler, run from the hardware timer interrupt
    ///
    /// Visits enabled slots in ascending order, so events due on the same
    /// tick fire in registration order.
    pub fn on_tick(&self) {
        let mut pending = self.list.enabled();

        while pending != 0 {
            let slot = pending.trailing_zeros() as usize;
            pending &= pending - 1;

            let due = critical_section::with(|cs| self.list.entry(cs, slot).countdown());
            if let Some(elapsed) = due {
                trace!("event {=usize} elapsed", slot);
                elapsed.invoke();
            }
        }
    }

    /// Whether `event` is currently enabled
    pub fn is_running(&self, event: &Event) -> bool {
        self.list.enabled() & event.mask() != 0
    }

    /// Whether [`init`](Self::init) has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Number of registered events
    pub fn registered(&self) -> usize {
        self.list.used()
    }

    /// Number of event slots
    pub const fn capacity(&self) -> usize {
        N
    }

    fn ensure_normal_context(&self) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }

        let in_interrupt = critical_section::with(|cs| self.probe.borrow(cs).get());
        if in_interrupt() {
            warn!("event timer used from interrupt context");
            return Err(Error::InvalidState);
        }
        Ok(())
    }

    /// Rejects handles that belong to another timer's table
    fn ensure_registered(&self, event: &Event) -> Result<()> {
        if event.slot() < self.list.used() {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    #[cfg(test)]
    fn remaining(&self, event: &Event) -> u16 {
        critical_section::with(|cs| self.list.entry(cs, event.slot()).remaining())
    }
}

impl<const N: usize> Default for EventTimer<N> {
    fn default() -> Self {
        Self::new()
    }
}
