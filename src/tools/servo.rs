//! Servo tester.
//!
//! Phase-correct PWM at a fixed 1:8 prescaler; the pulse width (compare
//! value) is what the user steers. Period presets cover analog (20 ms)
//! through high-speed digital (3 ms) servos. A sweep mode hands the pulse
//! width to a second, fixed-interval timer whose interrupt walks it back
//! and forth between the 1.0 ms and 2.0 ms marks.

use crate::config::Clock;
use crate::signal::pulse_step;
use crate::hal::prescale::TIMER1_PRESCALERS;
use crate::hal::sync::IrqCell;
use crate::hal::timer::{CompareChannel, OutputDrive, SweepTimer, WaveMode, WaveTimer};
use crate::tools::probe::{show_signal_pinout, SignalPort};
use crate::ui::display::{mark_item, DisplaySurface};
use crate::ui::input::{KeyEvent, UserInput, OPT_CURSOR_BLINK, OPT_DOUBLE_PRESS};
use crate::ui::strings::{Label, Strings};

/// Servo frame periods in 0.1 ms: 20 ms analog, 8/4/3 ms digital.
const PERIODS: [u16; 4] = [200, 80, 40, 30];

/// Sweep direction, flipped by the tick interrupt at either bound.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SweepDir {
    Forward,
    Backward,
}

/// Sweep parameters shared with the tick interrupt.
#[derive(Clone, Copy, Debug)]
pub struct Sweep {
    pub step: u8,
    pub dir: SweepDir,
}

impl Sweep {
    pub const fn slowest() -> Self {
        Self {
            step: 1,
            dir: SweepDir::Forward,
        }
    }
}

/// One sweep tick: walk the compare value by `sweep.step`, reversing at
/// the bounds. Pure so the interrupt handler and the tests share it.
pub fn sweep_advance(toggle: u16, sweep: Sweep, lower: u16, upper: u16) -> (u16, Sweep) {
    match sweep.dir {
        SweepDir::Forward => {
            let next = toggle.saturating_add(sweep.step as u16);
            if next >= upper {
                (
                    upper,
                    Sweep {
                        dir: SweepDir::Backward,
                        ..sweep
                    },
                )
            } else {
                (next, sweep)
            }
        }
        SweepDir::Backward => {
            let next = toggle.saturating_sub(sweep.step as u16);
            if next <= lower {
                (
                    lower,
                    Sweep {
                        dir: SweepDir::Forward,
                        ..sweep
                    },
                )
            } else {
                (next, sweep)
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Item {
    Pulse,
    Frequency,
}

pub fn servo_tool<W, T, P, D, I, S>(
    wave: &mut W,
    sweep_timer: &mut T,
    sweep: &IrqCell<Sweep>,
    probes: &mut P,
    display: &mut D,
    input: &mut I,
    strings: &S,
    clock: Clock,
) where
    W: WaveTimer,
    T: SweepTimer,
    P: SignalPort,
    D: DisplaySurface,
    I: UserInput,
    S: Strings,
{
    // pulse-width landmarks, all in timer counts at prescaler 1:8
    let left_max = clock.servo_toggle(5); // 0.5 ms
    let left_norm = clock.servo_toggle(10); // 1.0 ms
    let mid = clock.servo_toggle(15); // 1.5 ms
    let right_max = clock.servo_toggle(25); // 2.5 ms
    let sweep_step_max = (left_norm / 10) as u8;
    let base_step = clock.servo_pulse_step(); // ~0.01 ms

    display.clear();
    display.write_str(strings.lookup(Label::Servo));
    display.write_space();
    show_signal_pinout(display, input);

    probes.drive_signal();

    sweep_timer.arm(clock.sweep_timer_top());

    wave.stop();
    wave.reset();
    wave.configure(WaveMode::PhaseCorrectPwm, OutputDrive::NonInverting);
    wave.start(TIMER1_PRESCALERS.entry_at(1).bits); // fixed 1:8

    let mut toggle = mid;
    let mut period_index = 0usize;
    sweep.set(Sweep::slowest());

    let mut item = Item::Pulse;
    let mut run = true;
    let mut sweeping = false;
    let mut toggle_sweep = false;
    let mut change_pulse = true;
    let mut change_freq = true;
    let mut show_pulse = true;
    let mut show_freq = true;
    let mut last = KeyEvent::None;

    while run {
        if change_pulse {
            wave.set_compare(CompareChannel::B, toggle);
            change_pulse = false;
        }

        if change_freq {
            wave.set_top(clock.servo_toggle(PERIODS[period_index]));
            change_freq = false;
        }

        if show_pulse {
            display.clear_line(2);
            mark_item(display, item == Item::Pulse);

            let value = if sweeping {
                // full sweep takes toggle_1ms / step ticks of ~3 ms each
                clock.sweep_step_time_us() * left_norm as u32 / sweep.get().step as u32
            } else {
                // t = toggle * 2 * 8 / clk, shown in 0.001 ms
                toggle as u32 * 16_000 / (clock.hz() / 1000)
            };
            display.write_value(value, -3, Some('m'));
            display.write_char('s');
            show_pulse = false;
        }

        if show_freq {
            display.clear_line(3);
            mark_item(display, item == Item::Frequency);
            display.write_value(10_000 / PERIODS[period_index] as u32, 0, None);
            display.write_str(strings.lookup(Label::Hertz));
            if sweeping {
                display.write_space();
                display.write_str(strings.lookup(Label::Sweep));
            }
            show_freq = false;
        }

        if last == KeyEvent::LongPress {
            input.smooth_long_press();
        }

        last = input.poll(0, OPT_CURSOR_BLINK | OPT_DOUBLE_PRESS);
        let velocity = input.rotation_velocity();

        // step sizes for the two value ranges
        let sweep_step_size = if velocity > 1 {
            (velocity as u16 - 1) * (sweep_step_max as u16 / 32 + 1)
        } else {
            1
        };
        let pulse_step_size = pulse_step(velocity, base_step);

        match last {
            KeyEvent::ShortPress => {
                item = match item {
                    Item::Pulse => Item::Frequency,
                    Item::Frequency => Item::Pulse,
                };
                show_pulse = true;
                show_freq = true;
            }
            KeyEvent::DoublePress => {
                run = false;
            }
            KeyEvent::LongPress => match item {
                Item::Pulse => {
                    if sweeping {
                        // back to the slowest sweep
                        sweep.update(|s| Sweep { step: 1, ..s });
                        show_pulse = true;
                    } else {
                        toggle = mid;
                        change_pulse = true;
                        show_pulse = true;
                    }
                }
                Item::Frequency => {
                    sweeping = !sweeping;
                    toggle_sweep = true;
                    show_pulse = true;
                    show_freq = true;
                }
            },
            KeyEvent::RotateRight => match item {
                Item::Pulse => {
                    if sweeping {
                        sweep.update(|s| {
                            let step = (s.step as u16 + sweep_step_size)
                                .min(sweep_step_max as u16) as u8;
                            Sweep { step, ..s }
                        });
                        show_pulse = true;
                    } else {
                        toggle = toggle.saturating_add(pulse_step_size).min(right_max);
                        change_pulse = true;
                        show_pulse = true;
                    }
                }
                Item::Frequency => {
                    if period_index < PERIODS.len() - 1 {
                        period_index += 1;
                        change_freq = true;
                        show_freq = true;
                    }
                }
            },
            KeyEvent::RotateLeft => match item {
                Item::Pulse => {
                    if sweeping {
                        sweep.update(|s| {
                            let step = s.step.saturating_sub(sweep_step_size.min(255) as u8).max(1);
                            Sweep { step, ..s }
                        });
                        show_pulse = true;
                    } else {
                        toggle = toggle.saturating_sub(pulse_step_size).max(left_max);
                        change_pulse = true;
                        show_pulse = true;
                    }
                }
                Item::Frequency => {
                    if period_index > 0 {
                        period_index -= 1;
                        change_freq = true;
                        show_freq = true;
                    }
                }
            },
            _ => {}
        }

        if toggle_sweep {
            if sweeping {
                sweep.set(Sweep::slowest());
                sweep_timer.start();
            } else {
                sweep_timer.stop();
            }
            toggle_sweep = false;
        }
    }

    // clean up on every exit path
    sweep_timer.disarm();
    wave.stop();
    wave.configure(WaveMode::Normal, OutputDrive::None);
    probes.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{SimKeys, SimSignalPort, SimState, SimSweepTimer, SimWaveTimer, TestScreen};
    use crate::ui::strings::English;

    const CLOCK: Clock = Clock::new(16_000_000);

    fn run_tool(script: Vec<(KeyEvent, u8)>) -> (SimState, IrqCell<Sweep>) {
        let state = SimState::shared();
        let sweep = IrqCell::new(Sweep::slowest());
        let mut wave = SimWaveTimer::new(&state);
        let mut sweep_timer = SimSweepTimer::new(&state);
        let mut probes = SimSignalPort::new(&state);
        let mut display = TestScreen::new();
        let mut input = SimKeys::new(script);
        servo_tool(
            &mut wave,
            &mut sweep_timer,
            &sweep,
            &mut probes,
            &mut display,
            &mut input,
            &English,
            CLOCK,
        );
        (state.snapshot(), sweep)
    }

    #[test]
    fn sweep_walks_and_reverses_at_both_bounds() {
        let lower = CLOCK.servo_toggle(10);
        let upper = CLOCK.servo_toggle(20);
        let mut toggle = lower;
        let mut sweep = Sweep {
            step: 100,
            dir: SweepDir::Forward,
        };

        let mut seen_upper = false;
        let mut seen_lower = false;
        for _ in 0..50 {
            let (next, s) = sweep_advance(toggle, sweep, lower, upper);
            assert!((lower..=upper).contains(&next));
            if next == upper {
                seen_upper = true;
                assert_eq!(s.dir, SweepDir::Backward);
            }
            if next == lower {
                seen_lower = true;
                assert_eq!(s.dir, SweepDir::Forward);
            }
            toggle = next;
            sweep = s;
        }
        assert!(seen_upper && seen_lower);
    }

    #[test]
    fn starts_centered_at_50hz() {
        let (state, _) = run_tool(vec![(KeyEvent::DoublePress, 1)]);
        assert_eq!(state.wave.compare_b, CLOCK.servo_toggle(15));
        assert_eq!(state.wave.top, CLOCK.servo_toggle(200));
        assert_eq!(state.wave.prescaler_bits, 0b010);
    }

    #[test]
    fn pulse_width_clamps_at_the_rails() {
        // hold right at full speed way past 2.5 ms
        let mut script = vec![(KeyEvent::RotateRight, 7); 40];
        script.push((KeyEvent::DoublePress, 1));
        let (state, _) = run_tool(script);
        assert_eq!(state.wave.compare_b, CLOCK.servo_toggle(25));

        let mut script = vec![(KeyEvent::RotateLeft, 7); 40];
        script.push((KeyEvent::DoublePress, 1));
        let (state, _) = run_tool(script);
        assert_eq!(state.wave.compare_b, CLOCK.servo_toggle(5));
    }

    #[test]
    fn entering_sweep_starts_only_the_tick_timer() {
        let (state, sweep) = run_tool(vec![
            (KeyEvent::ShortPress, 1), // select frequency item
            (KeyEvent::LongPress, 1),  // enter sweep
            (KeyEvent::DoublePress, 1),
        ]);
        assert!(state.sweep_timer.started);
        assert_eq!(sweep.get().step, 1);
        // the PWM timer setup is untouched by sweep entry
        assert_eq!(state.wave.prescaler_bits, 0b010);
        // teardown disarmed the tick timer again
        assert!(!state.sweep_timer.running);
        assert!(!state.sweep_timer.armed);
    }

    #[test]
    fn leaving_sweep_stops_the_tick_timer() {
        let (state, _) = run_tool(vec![
            (KeyEvent::ShortPress, 1),
            (KeyEvent::LongPress, 1), // enter sweep
            (KeyEvent::LongPress, 1), // leave sweep
            (KeyEvent::DoublePress, 1),
        ]);
        assert!(state.sweep_timer.started);
        assert!(state.sweep_timer.stopped_before_disarm);
    }

    #[test]
    fn period_presets_step_through_the_table() {
        let (state, _) = run_tool(vec![
            (KeyEvent::ShortPress, 1),  // frequency item
            (KeyEvent::RotateRight, 1), // 50 Hz -> 125 Hz
            (KeyEvent::RotateRight, 1), // -> 250 Hz
            (KeyEvent::DoublePress, 1),
        ]);
        assert_eq!(state.wave.top, CLOCK.servo_toggle(40));
    }

    #[test]
    fn teardown_releases_everything() {
        for script_len in 0..4 {
            let keys = [
                (KeyEvent::ShortPress, 1),
                (KeyEvent::LongPress, 1),
                (KeyEvent::RotateRight, 3),
            ];
            let mut script: Vec<_> = keys[..script_len.min(3)].to_vec();
            script.push((KeyEvent::DoublePress, 1));
            let (state, _) = run_tool(script);
            assert!(!state.wave.running);
            assert!(!state.sweep_timer.armed);
            assert!(!state.signal_driven);
        }
    }
}
