//! Square-wave generator.
//!
//! Fast PWM at a fixed 50 % duty cycle; only the frequency is adjustable.
//! The timer is stopped and re-armed on every change so a prescaler swap
//! cannot glitch the output mid-cycle.

use crate::config::Clock;
use crate::signal::{fast_pwm_frequency, step_down, step_up, top_step, SQUARE_TOP_MAX, SQUARE_TOP_MIN};
use crate::hal::prescale::TIMER1_PRESCALERS;
use crate::hal::timer::{CompareChannel, OutputDrive, WaveMode, WaveTimer};
use crate::range::FreqScaler;
use crate::tools::probe::{show_signal_pinout, SignalPort};
use crate::ui::display::DisplaySurface;
use crate::ui::input::{KeyEvent, UserInput, OPT_DOUBLE_PRESS};
use crate::ui::strings::{Label, Strings};

pub fn squarewave_tool<W, P, D, I, S>(
    wave: &mut W,
    probes: &mut P,
    display: &mut D,
    input: &mut I,
    strings: &S,
    clock: Clock,
) where
    W: WaveTimer,
    P: SignalPort,
    D: DisplaySurface,
    I: UserInput,
    S: Strings,
{
    display.clear();
    display.write_str(strings.lookup(Label::SquareWave));
    display.write_space();
    show_signal_pinout(display, input);

    probes.drive_signal();

    wave.stop();
    wave.configure(WaveMode::FastPwm, OutputDrive::Inverting);

    // 1 kHz default
    let mut scaler = FreqScaler::new(&TIMER1_PRESCALERS);
    let mut top = clock.fast_pwm_top(1000);
    let mut run = true;

    while run {
        top = scaler.rescale(top);

        // re-arm from a stopped counter so the new top takes effect cleanly
        wave.stop();
        wave.reset();
        wave.set_compare(CompareChannel::B, top / 2);
        wave.set_top(top);
        wave.start(scaler.entry().bits);

        display.clear_line(2);
        let (value, places) = fast_pwm_frequency(clock, scaler.entry().divisor, top);
        display.write_value(value, -(places as i8), None);
        display.write_str(strings.lookup(Label::Hertz));

        match input.poll(0, OPT_DOUBLE_PRESS) {
            KeyEvent::RotateRight => {
                top = step_down(top, top_step(input.rotation_velocity()), SQUARE_TOP_MIN);
            }
            KeyEvent::RotateLeft => {
                top = step_up(top, top_step(input.rotation_velocity()), SQUARE_TOP_MAX);
            }
            KeyEvent::LongPress => {
                scaler.reset();
                top = clock.fast_pwm_top(1000);
            }
            KeyEvent::DoublePress => {
                run = false;
            }
            _ => {}
        }
    }

    wave.stop();
    wave.configure(WaveMode::Normal, OutputDrive::None);
    probes.release();
}
