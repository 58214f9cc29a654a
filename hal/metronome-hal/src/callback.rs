//! Type-erased interrupt callbacks
//!
//! A [`Callback`] pairs a plain function pointer with the context it should
//! be called with. It is `Copy`, fixed-size and needs no allocator, so it
//! can be stored by value in a driver's static tables and handed to a
//! peripheral as its interrupt handler.

#![allow(unsafe_code)]

use core::fmt;

/// A function plus the `'static` context it is invoked with
///
/// Built from `fn(&'static T)` and a `&'static T`; the concrete `T` is
/// erased so callbacks for different context types fit in one table.
#[derive(Clone, Copy)]
pub struct Callback {
    call: unsafe fn(*const (), *const ()),
    func: *const (),
    cookie: *const (),
}

// SAFETY: `cookie` always comes from a `&'static T` with `T: Sync`, and
// `func` is a plain function pointer. Both may be used from any context.
unsafe impl Send for Callback {}
unsafe impl Sync for Callback {}

/// Re-types `func`/`cookie` and calls through.
///
/// # Safety
///
/// `func` must have been produced from a `fn(&'static T)` and `cookie`
/// from a `&'static T`, with the same `T`.
unsafe fn call_with_cookie<T: 'static>(func: *const (), cookie: *const ()) {
    let func: fn(&'static T) = unsafe { core::mem::transmute(func) };
    func(unsafe { &*cookie.cast::<T>() })
}

/// # Safety
///
/// `func` must have been produced from a `fn()`.
unsafe fn call_plain(func: *const (), _cookie: *const ()) {
    let func: fn() = unsafe { core::mem::transmute(func) };
    func()
}

impl Callback {
    /// Create a callback that invokes `func(cookie)`
    pub fn new<T: Sync + 'static>(func: fn(&'static T), cookie: &'static T) -> Self {
        Self {
            call: call_with_cookie::<T>,
            func: func as *const (),
            cookie: (cookie as *const T).cast(),
        }
    }

    /// Create a callback without context
    pub fn from_fn(func: fn()) -> Self {
        Self {
            call: call_plain,
            func: func as *const (),
            cookie: core::ptr::null(),
        }
    }

    /// Invoke the callback
    ///
    /// Runs in whatever context the caller is in. Interrupt-side callers
    /// must not hold a critical section across this call.
    #[inline]
    pub fn invoke(&self) {
        // SAFETY: `call`, `func` and `cookie` are only ever set together by
        // the constructors above, which uphold the trampolines' contracts.
        unsafe { (self.call)(self.func, self.cookie) }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("func", &self.func)
            .field("cookie", &self.cookie)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Callback {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Callback({=usize:#x})", self.func as usize)
    }
}
