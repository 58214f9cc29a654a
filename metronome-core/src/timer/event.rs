//! Event handles and the event table

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use metronome_hal::Callback;
use portable_atomic::{AtomicU32, AtomicU8, Ordering};

/// Maximum number of events, one per bit of the enabled mask
pub const MAX_EVENTS: usize = u32::BITS as usize;

/// Handle to a registered event
///
/// Neither `Clone` nor `Copy`: exactly one handle exists per
/// slot. It can be moved to hand ownership elsewhere. Slots are never
/// freed, so a handle stays valid for the life of its timer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    slot: u8,
}

impl Event {
    pub(crate) const fn new(slot: u8) -> Self {
        Self { slot }
    }

    /// Index of this event's slot in the table
    pub fn slot(&self) -> usize {
        self.slot as usize
    }

    pub(crate) fn mask(&self) -> u32 {
        1 << self.slot
    }
}

/// Per-slot state
///
/// `interval` and `elapsed` are written once at registration, while the
/// slot is still disabled. `cnt` is reset by `start` and counted down by
/// the tick handler.
pub(crate) struct EventEntry {
    interval: Cell<u16>,
    cnt: Cell<u16>,
    elapsed: Cell<Option<Callback>>,
}

impl EventEntry {
    const fn new() -> Self {
        Self {
            interval: Cell::new(0),
            cnt: Cell::new(0),
            elapsed: Cell::new(None),
        }
    }

    pub(crate) fn assign(&self, interval: u16, elapsed: Callback) {
        self.interval.set(interval);
        self.cnt.set(interval);
        self.elapsed.set(Some(elapsed));
    }

    /// Restart the countdown from the configured interval
    pub(crate) fn rearm(&self) {
        self.cnt.set(self.interval.get());
    }

    /// Advance one tick, returning the callback if the event is due
    ///
    /// An interval of 0 behaves as 1.
    pub(crate) fn countdown(&self) -> Option<Callback> {
        let cnt = self.cnt.get().saturating_sub(1);
        if cnt == 0 {
            self.cnt.set(self.interval.get().max(1));
            self.elapsed.get()
        } else {
            self.cnt.set(cnt);
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> u16 {
        self.cnt.get()
    }
}

/// Fixed event table
///
/// `enabled` has one bit per slot and is only read by the tick handler.
/// `used` counts allocated slots and never decreases.
pub(crate) struct EventList<const N: usize> {
    enabled: AtomicU32,
    used: AtomicU8,
    events: [Mutex<EventEntry>; N],
}

impl<const N: usize> EventList<N> {
    pub(crate) const fn new() -> Self {
        Self {
            enabled: AtomicU32::new(0),
            used: AtomicU8::new(0),
            events: [const { Mutex::new(EventEntry::new()) }; N],
        }
    }

    /// Claim the next free slot
    ///
    /// Returns `None` once all `N` slots are taken; the counter never
    /// moves past `N`.
    pub(crate) fn allocate(&self) -> Option<u8> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                ((used as usize) < N).then_some(used + 1)
            })
            .ok()
    }

    pub(crate) fn used(&self) -> usize {
        self.used.load(Ordering::Acquire) as usize
    }

    pub(crate) fn entry<'cs>(&'cs self, cs: CriticalSection<'cs>, slot: usize) -> &'cs EventEntry {
        self.events[slot].borrow(cs)
    }

    pub(crate) fn enable(&self, mask: u32) {
        self.enabled.fetch_or(mask, Ordering::AcqRel);
    }

    pub(crate) fn disable(&self, mask: u32) {
        self.enabled.fetch_and(!mask, Ordering::AcqRel);
    }

    pub(crate) fn enabled(&self) -> u32 {
        self.enabled.load(Ordering::Acquire)
    }
}
