//! Execution-context probes
//!
//! The drivers only allow some operations from normal (thread) context.
//! They detect violations through an [`InterruptProbe`] supplied in their
//! configuration. Detection is best effort: a probe that always answers
//! `false` turns the check off and leaves the rule as a documented
//! precondition.

/// Returns `true` while an interrupt handler is executing
pub type InterruptProbe = fn() -> bool;

/// Probe for targets without a way to tell; never reports interrupt context
pub fn thread_mode_only() -> bool {
    false
}

/// Probe reading the active exception number from the Cortex-M SCB
#[cfg(feature = "cortex-m")]
pub fn cortex_m_handler_active() -> bool {
    use cortex_m::peripheral::{scb::VectActive, SCB};

    !matches!(SCB::vect_active(), VectActive::ThreadMode)
}
