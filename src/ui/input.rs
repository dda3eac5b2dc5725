//! User input consumed by the tools.
//!
//! The electrical side (debounce, press-length classification, encoder
//! Gray-code decoding) lives in the board layer; the tools only see the
//! classified events from the blocking poll.

/// Classified user input events.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyEvent {
    None,
    ShortPress,
    LongPress,
    /// Two short presses in quick succession: the universal exit signal.
    DoublePress,
    /// Timeout expired or the break signal was raised.
    TimedOut,
    RotateLeft,
    RotateRight,
}

/// `poll` option: classify two quick presses as `DoublePress`.
pub const OPT_DOUBLE_PRESS: u8 = 0b0000_0001;
/// `poll` option: blink the cursor while waiting.
pub const OPT_CURSOR_BLINK: u8 = 0b0000_0010;

pub trait UserInput {
    /// Block until a key event arrives, `timeout_ms` expires (0 means no
    /// timeout) or the break signal is raised; the latter two return
    /// `TimedOut`.
    ///
    /// A timer interrupt that raises the break signal has fully run by the
    /// time this returns, so shared state updated by the handler may be
    /// inspected right after.
    fn poll(&mut self, timeout_ms: u16, options: u8) -> KeyEvent;

    /// Turn velocity of the most recent rotate event, 1..=7.
    fn rotation_velocity(&self) -> u8;

    /// Settling pause after a long press so held keys repeat smoothly.
    fn smooth_long_press(&mut self) {}
}
