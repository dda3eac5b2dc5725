//! Probe header handling shared by the tools.

use crate::ui::display::DisplaySurface;
use crate::ui::input::UserInput;

/// Probe wiring for the signal generators.
pub trait SignalPort {
    /// Ground probes 1 and 3, route the timer output to probe 2.
    fn drive_signal(&mut self);

    /// Everything back to high impedance. Every tool exit path ends here,
    /// including cancellation.
    fn release(&mut self);
}

/// Pulse-input pin handling for the counter tools. The pin can be shared
/// with the display, so its direction is saved and restored per window.
pub trait CounterPort {
    /// Switch the pin to input and wait for it to settle.
    fn listen(&mut self);

    /// Restore the pre-entry direction.
    fn restore(&mut self);
}

/// Show which probes carry the signal: `1:- 2:s 3:-` (ground, signal,
/// ground), then wait for a key press or 5 s.
pub fn show_signal_pinout<D, I>(display: &mut D, input: &mut I)
where
    D: DisplaySurface,
    I: UserInput,
{
    display.clear_line(2);
    for (probe, role) in [('1', '-'), ('2', 's'), ('3', '-')] {
        display.write_char(probe);
        display.write_char(':');
        display.write_char(role);
        display.write_space();
    }

    input.poll(5000, 0);
    display.clear_line(2);
}
