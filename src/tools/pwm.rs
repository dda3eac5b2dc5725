//! PWM generator tool.
//!
//! Phase-correct PWM on the 16-bit timer, output on compare channel B.
//! The encoder adjusts either the frequency (via the top value, with
//! auto-ranging across the prescaler table) or the duty ratio; a short
//! press toggles between the two, a long press resets the selected value
//! and a double press exits.

use crate::config::Clock;
use crate::signal::{
    phase_pwm_frequency, ratio_step, step_down, step_up, top_step, SignalState, PWM_TOP_MAX,
    PWM_TOP_MIN,
};
use crate::hal::timer::{CompareChannel, OutputDrive, WaveMode, WaveTimer};
use crate::tools::probe::{show_signal_pinout, SignalPort};
use crate::ui::display::{mark_item, DisplaySurface};
use crate::ui::input::{KeyEvent, UserInput, OPT_DOUBLE_PRESS};
use crate::ui::strings::{Label, Strings};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Adjust {
    Frequency,
    Ratio,
}

pub fn pwm_tool<W, P, D, I, S>(
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
    display.write_str(strings.lookup(Label::Pwm));
    display.write_space();
    show_signal_pinout(display, input);

    probes.drive_signal();

    wave.stop();
    wave.reset();
    wave.configure(WaveMode::PhaseCorrectPwm, OutputDrive::NonInverting);

    let mut state = SignalState::pwm_default(clock);
    let mut adjust = Adjust::Frequency;
    let mut run = true;
    let mut change_freq = true;
    let mut change_ratio = true;
    let mut show_freq = true;
    let mut show_ratio = true;
    let mut last = KeyEvent::None;

    while run {
        if change_freq {
            state.autorange();
            wave.set_top(state.top);
            wave.start(state.scaler.entry().bits);
            change_freq = false;
            // a frequency change moves the toggle value as well
            change_ratio = true;
        }

        if change_ratio {
            state.recompute_toggle();
            wave.set_compare(CompareChannel::B, state.toggle);
            change_ratio = false;
        }

        if show_freq {
            display.clear_line(2);
            mark_item(display, adjust == Adjust::Frequency);
            let (value, places) = phase_pwm_frequency(clock, state.scaler.entry().divisor, state.top);
            display.write_value(value, -(places as i8), None);
            display.write_str(strings.lookup(Label::Hertz));
            show_freq = false;
        }

        if show_ratio {
            display.clear_line(3);
            mark_item(display, adjust == Adjust::Ratio);
            display.write_value(state.ratio as u32, 0, Some('%'));
            show_ratio = false;
        }

        if last == KeyEvent::LongPress {
            input.smooth_long_press();
        }

        last = input.poll(0, OPT_DOUBLE_PRESS);
        let velocity = input.rotation_velocity();

        match last {
            KeyEvent::ShortPress => {
                adjust = match adjust {
                    Adjust::Frequency => Adjust::Ratio,
                    Adjust::Ratio => Adjust::Frequency,
                };
                show_freq = true;
                show_ratio = true;
            }
            KeyEvent::DoublePress => {
                run = false;
            }
            KeyEvent::LongPress => match adjust {
                Adjust::Frequency => {
                    state.reset_frequency(clock);
                    change_freq = true;
                    show_freq = true;
                }
                Adjust::Ratio => {
                    state.set_ratio(50);
                    change_ratio = true;
                    show_ratio = true;
                }
            },
            KeyEvent::RotateRight => match adjust {
                Adjust::Frequency => {
                    // higher frequency: smaller top
                    state.top = step_down(state.top, top_step(velocity), PWM_TOP_MIN);
                    change_freq = true;
                    show_freq = true;
                }
                Adjust::Ratio => {
                    let ratio = state.ratio.saturating_add(ratio_step(velocity));
                    state.set_ratio(ratio);
                    change_ratio = true;
                    show_ratio = true;
                }
            },
            KeyEvent::RotateLeft => match adjust {
                Adjust::Frequency => {
                    // lower frequency: larger top
                    state.top = step_up(state.top, top_step(velocity), PWM_TOP_MAX);
                    change_freq = true;
                    show_freq = true;
                }
                Adjust::Ratio => {
                    let ratio = state.ratio.saturating_sub(ratio_step(velocity));
                    state.set_ratio(ratio);
                    change_ratio = true;
                    show_ratio = true;
                }
            },
            _ => {}
        }
    }

    // clean up on every exit path
    wave.stop();
    wave.configure(WaveMode::Normal, OutputDrive::None);
    probes.release();
}
