//! Generator arithmetic: top/toggle values, display scaling and the
//! encoder acceleration curves shared by the signal tools.

use crate::config::Clock;
use crate::hal::prescale::TIMER1_PRESCALERS;
use crate::range::FreqScaler;

/// Smallest top for the PWM tool; 1 % duty steps need at least 100 counts.
pub const PWM_TOP_MIN: u16 = 0x0064;
pub const PWM_TOP_MAX: u16 = 0xFFFF;

/// Smallest top for the square-wave generator.
pub const SQUARE_TOP_MIN: u16 = 0x0003;
pub const SQUARE_TOP_MAX: u16 = 0xFFFE;

/// Frequency and duty state of a generator: period as the timer top value,
/// duty as the compare/toggle value, prescaler via the auto-ranger.
pub struct SignalState {
    pub top: u16,
    pub toggle: u16,
    pub ratio: u8,
    pub scaler: FreqScaler,
}

impl SignalState {
    /// PWM tool start values: 1 kHz at 50 % duty, prescaler 1:1.
    pub fn pwm_default(clock: Clock) -> Self {
        let top = clock.phase_pwm_top(1000);
        Self {
            top,
            toggle: toggle_value(top, 50),
            ratio: 50,
            scaler: FreqScaler::new(&TIMER1_PRESCALERS),
        }
    }

    /// Reset frequency to the 1 kHz default, keeping the duty ratio.
    pub fn reset_frequency(&mut self, clock: Clock) {
        self.scaler.reset();
        self.top = clock.phase_pwm_top(1000);
        self.recompute_toggle();
    }

    /// Run one auto-ranging step on the current top value and keep the
    /// duty ratio by recomputing the toggle from it.
    pub fn autorange(&mut self) {
        self.top = self.scaler.rescale(self.top);
        self.recompute_toggle();
    }

    pub fn set_ratio(&mut self, ratio: u8) {
        self.ratio = if ratio > 100 { 100 } else { ratio };
        self.recompute_toggle();
    }

    pub fn recompute_toggle(&mut self) {
        self.toggle = toggle_value(self.top, self.ratio);
    }
}

/// toggle = top * ratio / 100, truncating.
pub fn toggle_value(top: u16, ratio: u8) -> u16 {
    (top as u32 * ratio as u32 / 100) as u16
}

/// Step a top value down (higher frequency), saturating at `floor`.
pub fn step_down(top: u16, step: u16, floor: u16) -> u16 {
    let stepped = top.saturating_sub(step);
    if stepped < floor {
        floor
    } else {
        stepped
    }
}

/// Step a top value up (lower frequency), saturating at `ceiling`.
pub fn step_up(top: u16, step: u16, ceiling: u16) -> u16 {
    let stepped = top.saturating_add(step);
    if stepped > ceiling {
        ceiling
    } else {
        stepped
    }
}

/// Display value for a phase-correct PWM frequency.
///
/// f = clk / (2 * N * top), returned as a scaled integer plus its decimal
/// place count: 0.01 Hz resolution at 1:1, one more digit per 1:8 step of
/// the divisor (larger divisors leave more headroom in 32 bits).
pub fn phase_pwm_frequency(clock: Clock, divisor: u16, top: u16) -> (u32, u8) {
    scaled_frequency(clock.hz() * 50, divisor, top as u32)
}

/// Display value for a fast PWM frequency, f = clk / (N * (top + 1)).
pub fn fast_pwm_frequency(clock: Clock, divisor: u16, top: u16) -> (u32, u8) {
    scaled_frequency(clock.hz() * 100, divisor, top as u32 + 1)
}

fn scaled_frequency(base: u32, divisor: u16, period: u32) -> (u32, u8) {
    let mut value = base / divisor as u32;
    let mut places = 2u8;

    // use the headroom a large divisor leaves for extra decimal places
    let mut d = divisor;
    while d >= 8 {
        value *= 10;
        places += 1;
        d /= 8;
    }

    (value / period, places)
}

/// Encoder acceleration for top-value adjustment: velocity (1..=7) to the
/// quartic step curve, so fast turns cross the 16-bit range quickly.
pub fn top_step(velocity: u8) -> u16 {
    let v = clamp_velocity(velocity) as u16;
    if v <= 1 {
        1
    } else {
        let squared = v * v;
        squared * squared
    }
}

/// Encoder acceleration for the duty ratio: quadratic curve over the
/// 0..=100 range.
pub fn ratio_step(velocity: u8) -> u8 {
    let v = clamp_velocity(velocity);
    if v <= 1 {
        1
    } else {
        v * v
    }
}

/// Encoder acceleration for the servo pulse width, scaled to the clock's
/// 0.01 ms resolution step.
pub fn pulse_step(velocity: u8, base_step: u16) -> u16 {
    let v = clamp_velocity(velocity) as u16;
    if v <= 1 {
        base_step
    } else {
        v * v * base_step / 2
    }
}

fn clamp_velocity(velocity: u8) -> u8 {
    if velocity < 1 {
        1
    } else if velocity > 7 {
        7
    } else {
        velocity
    }
}
