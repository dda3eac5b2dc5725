//! Interrupt-safe sharing primitives.
//!
//! The firmware has exactly one foreground loop and a handful of
//! run-to-completion interrupt handlers, so a short interrupt-free section
//! is all the mutual exclusion that is ever needed. Host builds (the test
//! suite) are single-threaded and get a no-op section.

use core::cell::Cell;

/// Run `f` with interrupts disabled, restoring the previous state after.
#[cfg(target_arch = "avr")]
pub fn free<R>(f: impl FnOnce() -> R) -> R {
    avr_device::interrupt::free(|_| f())
}

#[cfg(not(target_arch = "avr"))]
pub fn free<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Cell shared between one interrupt handler and the foreground loop.
///
/// Every access runs inside an interrupt-free section, so reads of values
/// wider than the CPU word cannot tear.
pub struct IrqCell<T: Copy> {
    value: Cell<T>,
}

// Access is confined to interrupt-free sections; there is no second
// thread of execution that could observe a partial update.
unsafe impl<T: Copy + Send> Sync for IrqCell<T> {}

impl<T: Copy> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: Cell::new(value),
        }
    }

    pub fn get(&self) -> T {
        free(|| self.value.get())
    }

    pub fn set(&self, value: T) {
        free(|| self.value.set(value));
    }

    /// Read-modify-write in one interrupt-free section; returns the new
    /// value.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> T {
        free(|| {
            let value = f(self.value.get());
            self.value.set(value);
            value
        })
    }
}

/// Wakeup flag raised by a timer interrupt and consumed by the blocking
/// input poll.
///
/// Single writer (the ISR), single reader (the poll loop). Raising the
/// flag happens after the ISR's other side effects, and the poll loop only
/// inspects shared state after observing the flag, which gives the
/// effects-visible-before-poll-returns ordering the tools rely on.
pub struct BreakSignal {
    raised: IrqCell<bool>,
}

impl BreakSignal {
    pub const fn new() -> Self {
        Self {
            raised: IrqCell::new(false),
        }
    }

    pub fn raise(&self) {
        self.raised.set(true);
    }

    pub fn clear(&self) {
        self.raised.set(false);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.get()
    }

    /// Consume the flag; true if it was raised.
    pub fn take(&self) -> bool {
        free(|| {
            let was = self.raised.get();
            if was {
                self.raised.set(false);
            }
            was
        })
    }
}

impl Default for BreakSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_the_flag() {
        let signal = BreakSignal::new();
        assert!(!signal.take());
        signal.raise();
        assert!(signal.is_raised());
        assert!(signal.take());
        assert!(!signal.is_raised());
        assert!(!signal.take());
    }

    #[test]
    fn irq_cell_update_returns_new_value() {
        let cell = IrqCell::new(40u32);
        assert_eq!(cell.update(|v| v + 2), 42);
        assert_eq!(cell.get(), 42);
    }
}
