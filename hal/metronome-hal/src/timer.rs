//! Periodic tick timer abstraction

use crate::Callback;

/// Hardware timer that raises an interrupt at a fixed period
///
/// One tick of this timer is the unit every software event interval is
/// measured in.
pub trait TickTimer {
    /// Program the timer to fire every `period_us` microseconds
    fn configure_periodic_tick(&mut self, period_us: u32);

    /// Install the function run from the tick interrupt
    ///
    /// Replaces any previously installed handler.
    fn register_tick_handler(&mut self, handler: Callback);

    /// Start counting and enable the tick interrupt
    fn start(&mut self);

    /// Stop counting and mask the tick interrupt
    fn stop(&mut self);
}
