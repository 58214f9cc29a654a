//! Transmit job queue
//!
//! Fixed-capacity circular buffer shared between exactly one producer
//! (normal context, enqueueing writes) and one consumer (the DMA
//! completion interrupt, dequeueing them). Head and tail are separate
//! atomics, each written by only one side, so neither side ever waits.
//!
//! # Precondition
//!
//! Single producer, single consumer. Two normal-context callers enqueueing
//! concurrently, or two consumers dequeueing concurrently, is undefined.
//! [`SerialEngine`](crate::SerialEngine) upholds this by only enqueueing
//! from `write` and only dequeueing from its completion handler.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use portable_atomic::{AtomicUsize, Ordering};

/// Lock-free single-producer/single-consumer queue of `Copy` jobs
///
/// All `Q` slots are usable. Head and tail run over `0..2 * Q` so a full
/// queue can be told apart from an empty one without wasting a slot.
pub struct JobQueue<T: Copy, const Q: usize> {
    /// Next slot to dequeue; written only by the consumer
    head: AtomicUsize,
    /// Next slot to enqueue; written only by the producer
    tail: AtomicUsize,
    slots: [UnsafeCell<MaybeUninit<T>>; Q],
}

// SAFETY: a slot is written by the producer only while it lies outside
// `head..tail`, and read by the consumer only while inside it. The
// Release/Acquire pairs on `tail` and `head` order those accesses.
unsafe impl<T: Copy + Send, const Q: usize> Sync for JobQueue<T, Q> {}

impl<T: Copy, const Q: usize> JobQueue<T, Q> {
    const CAPACITY_OK: () = assert!(Q >= 1, "job queue capacity must be at least 1");

    /// Create an empty queue
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; Q],
        }
    }

    /// Append `job`; producer side only
    ///
    /// Returns the job back when the queue is full. Nothing is overwritten.
    pub fn enqueue(&self, job: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if Self::distance(head, tail) == Q {
            return Err(job);
        }

        // SAFETY: the slot at `tail` is outside `head..tail`, so the consumer
        // does not touch it until the store below publishes it.
        unsafe { (*self.slots[tail % Q].get()).write(job) };
        self.tail.store(Self::advance(tail), Ordering::Release);
        Ok(())
    }

    /// Remove the oldest job; consumer side only
    pub fn dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: `head != tail`, so the slot was initialized by an enqueue
        // whose Release store on `tail` we observed above.
        let job = unsafe { (*self.slots[head % Q].get()).assume_init_read() };
        self.head.store(Self::advance(head), Ordering::Release);
        Some(job)
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        Self::distance(head, tail)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the queue is full
    pub fn is_full(&self) -> bool {
        self.len() == Q
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        Q
    }

    fn advance(index: usize) -> usize {
        (index + 1) % (2 * Q)
    }

    fn distance(head: usize, tail: usize) -> usize {
        (tail + 2 * Q - head) % (2 * Q)
    }
}

impl<T: Copy, const Q: usize> Default for JobQueue<T, Q> {
    fn default() -> Self {
        Self::new()
    }
}
