//! Timer abstraction for the tool engines.
//!
//! All bit-level register knowledge lives in the platform backends; the
//! tools only see these traits. The 16-bit waveform/gate timer and the
//! externally clocked 8-bit pulse counter are separate traits because they
//! are never interchangeable: the former is driven by the system clock via
//! a prescaler, the latter by the signal under test.

/// Waveform generation modes of the 16-bit timer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WaveMode {
    /// Plain count-up, no output
    Normal,
    /// Clear on compare match A
    Ctc,
    /// Triangle count, f = clk / (2 * N * top)
    PhaseCorrectPwm,
    /// Sawtooth count, f = clk / (N * (top + 1))
    FastPwm,
}

/// Output pin behaviour on a channel B compare match.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputDrive {
    /// Pin disconnected from the timer
    None,
    /// Clear on match, set at bottom
    NonInverting,
    /// Set on match, clear at bottom
    Inverting,
}

/// Compare channels of the 16-bit timer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompareChannel {
    A,
    B,
}

/// Interrupt sources of the 16-bit timer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerIrq {
    Overflow,
    CompareA,
    CompareB,
}

/// 16-bit waveform/gate timer.
///
/// Inputs are validated by the caller against the counter width; none of
/// these operations can fail at runtime.
pub trait WaveTimer {
    /// Select waveform mode and output drive.
    ///
    /// Callers stop the timer first: changing the mode of a running timer
    /// can produce a spurious compare match during the transition.
    fn configure(&mut self, mode: WaveMode, drive: OutputDrive);

    /// Set the wrap/reset value (period).
    fn set_top(&mut self, top: u16);

    /// Set a compare value (channel B toggles the output pin).
    fn set_compare(&mut self, channel: CompareChannel, value: u16);

    fn compare(&self, channel: CompareChannel) -> u16;

    /// Zero the counter.
    fn reset(&mut self);

    /// Start (or restart) counting with the given clock-select bits.
    fn start(&mut self, prescaler_bits: u8);

    /// Halt the counter, keeping mode and compare values.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn enable_irq(&mut self, irq: TimerIrq);
    fn disable_irq(&mut self, irq: TimerIrq);
    /// Discard a pending interrupt so it cannot end the next window early.
    fn clear_irq(&mut self, irq: TimerIrq);
}

/// Edge of the external signal that clocks the pulse counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Edge {
    Rising,
    Falling,
}

/// 8-bit counter clocked by the external signal under test.
///
/// The live value is only coherent together with the overflow accumulator
/// once the counter is stopped; see `PulseAccumulator::collect`.
pub trait PulseCounter {
    /// Start counting external edges from zero-adjacent state.
    fn start(&mut self, edge: Edge);

    fn stop(&mut self);

    /// Zero the counter.
    fn reset(&mut self);

    /// Live counter value (single-byte read, safe while running).
    fn count(&self) -> u16;

    fn is_running(&self) -> bool;

    fn enable_overflow_irq(&mut self);
    fn disable_overflow_irq(&mut self);
    fn clear_overflow_irq(&mut self);
}

/// Fixed-interval tick source for the servo sweep.
pub trait SweepTimer {
    /// Set up a CTC period and arm the compare interrupt, clock stopped.
    fn arm(&mut self, top: u8);

    /// Start ticking (the backend picks the fixed prescaler).
    fn start(&mut self);

    /// Pause ticking without disturbing the armed period.
    fn stop(&mut self);

    /// Stop and disable/clear the compare interrupt.
    fn disarm(&mut self);
}
