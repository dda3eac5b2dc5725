//! Interrupt-fed counters for the measurement tools.

use crate::hal::sync::IrqCell;
use crate::hal::timer::PulseCounter;

/// Pulse total shared between the counting timer's overflow interrupt and
/// the foreground loop.
///
/// The interrupt side only ever adds; the foreground side clears the
/// accumulator before arming a window and combines it with the final live
/// counter value once the window has closed. Totals saturate instead of
/// wrapping, so an overrun shows up as a stuck maximum rather than a
/// small bogus value.
pub struct PulseAccumulator {
    overflow: IrqCell<u32>,
}

impl PulseAccumulator {
    pub const fn new() -> Self {
        Self {
            overflow: IrqCell::new(0),
        }
    }

    /// Reset before arming a new measurement window.
    pub fn clear(&self) {
        self.overflow.set(0);
    }

    /// Interrupt path: account one counter overflow worth of pulses.
    pub fn record_overflow(&self, amount: u32) {
        self.overflow.update(|v| v.saturating_add(amount));
    }

    /// Accumulated overflow total without the live counter.
    pub fn peek(&self) -> u32 {
        self.overflow.get()
    }

    /// Combine the overflow total with the final live counter value.
    ///
    /// Only valid once the counting timer is stopped; on a running counter
    /// the two reads would not belong to the same instant.
    pub fn collect(&self, live: u16) -> u32 {
        self.overflow.get().saturating_add(live as u32)
    }

    /// Coherent snapshot while the counter is still running: re-reads the
    /// overflow total around the live read and retries on a change.
    pub fn sample<C: PulseCounter>(&self, counter: &C) -> u32 {
        loop {
            let before = self.overflow.get();
            let live = counter.count();
            if self.overflow.get() == before {
                return before.saturating_add(live as u32);
            }
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.overflow.get() == u32::MAX
    }
}

impl Default for PulseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed-time state fed by the event counter's tick interrupt.
///
/// The interrupt fires `per_second` times a second; full seconds are
/// carried into a 16-bit total.
pub struct TickCounter {
    subticks: IrqCell<u8>,
    seconds: IrqCell<u16>,
    per_second: u8,
}

impl TickCounter {
    pub const fn new(per_second: u8) -> Self {
        Self {
            subticks: IrqCell::new(0),
            seconds: IrqCell::new(0),
            per_second,
        }
    }

    pub fn clear(&self) {
        self.subticks.set(0);
        self.seconds.set(0);
    }

    /// Interrupt path: one tick; returns true on a full second.
    pub fn record_tick(&self) -> bool {
        let per_second = self.per_second;
        let subticks = self.subticks.update(|t| {
            if t + 1 >= per_second {
                0
            } else {
                t + 1
            }
        });
        if subticks == 0 {
            self.seconds.update(|s| s.saturating_add(1));
            true
        } else {
            false
        }
    }

    pub fn seconds(&self) -> u16 {
        self.seconds.get()
    }

    /// True right after a full second has been carried.
    pub fn at_second_boundary(&self) -> bool {
        self.subticks.get() == 0
    }
}
