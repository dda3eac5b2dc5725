//! Frequency counter.
//!
//! One 16-bit timer times the gate, the externally clocked 8-bit counter
//! counts pulses. When the gate compare match fires, its handler freezes
//! both timers and raises the break signal; the foreground loop then folds
//! the live counter into the overflow accumulator, runs the auto-ranger
//! and either displays the result or silently re-arms after a range
//! switch.
//!
//! The optional input stage in front of the counter pin adds a hardware
//! prescaler and two extra source channels (HF/LF crystal oscillator
//! test); with the plain `DirectInput` the tool degrades to the basic
//! single-channel counter.

use embedded_hal::digital::v2::OutputPin;

use crate::config::Clock;
use crate::hal::prescale::TIMER1_PRESCALERS;
use crate::hal::pulse::PulseAccumulator;
use crate::hal::sync::BreakSignal;
use crate::hal::timer::{CompareChannel, Edge, OutputDrive, PulseCounter, TimerIrq, WaveMode, WaveTimer};
use crate::range::{RangeSet, RangeStep};
use crate::tools::probe::CounterPort;
use crate::ui::display::DisplaySurface;
use crate::ui::input::{KeyEvent, UserInput, OPT_DOUBLE_PRESS};
use crate::ui::strings::{Label, Strings};

/// Source channels of the extended input stage.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputChannel {
    /// Buffered frequency input
    FreqInput,
    /// On-board HF crystal oscillator
    HfCrystal,
    /// On-board LF crystal oscillator
    LfCrystal,
}

impl InputChannel {
    pub fn label(self) -> Label {
        match self {
            InputChannel::FreqInput => Label::FreqInput,
            InputChannel::HfCrystal => Label::HfCrystal,
            InputChannel::LfCrystal => Label::LfCrystal,
        }
    }

    fn next(self) -> Self {
        match self {
            InputChannel::FreqInput => InputChannel::HfCrystal,
            InputChannel::HfCrystal => InputChannel::LfCrystal,
            InputChannel::LfCrystal => InputChannel::FreqInput,
        }
    }

    fn prev(self) -> Self {
        match self {
            InputChannel::FreqInput => InputChannel::LfCrystal,
            InputChannel::HfCrystal => InputChannel::FreqInput,
            InputChannel::LfCrystal => InputChannel::HfCrystal,
        }
    }
}

/// Hardware in front of the counter pin.
pub trait InputStage {
    /// Number of selectable source channels.
    fn channels(&self) -> u8 {
        1
    }

    fn select(&mut self, _channel: InputChannel) {}

    /// Engage (or bypass) the hardware prescaler.
    fn set_divider(&mut self, _div: u8) {}

    /// Control lines back to their resting state.
    fn release(&mut self) {}
}

/// Plain counter input without any front-end hardware.
pub struct DirectInput;

impl InputStage for DirectInput {}

/// Extended front end: divider select plus a two-bit channel address,
/// driven over three control lines.
pub struct CounterControl<DIV, CH0, CH1> {
    div: DIV,
    ch0: CH0,
    ch1: CH1,
}

impl<DIV, CH0, CH1> CounterControl<DIV, CH0, CH1>
where
    DIV: OutputPin,
    CH0: OutputPin,
    CH1: OutputPin,
{
    pub fn new(div: DIV, ch0: CH0, ch1: CH1) -> Self {
        Self { div, ch0, ch1 }
    }
}

impl<DIV, CH0, CH1> InputStage for CounterControl<DIV, CH0, CH1>
where
    DIV: OutputPin,
    CH0: OutputPin,
    CH1: OutputPin,
{
    fn channels(&self) -> u8 {
        3
    }

    fn select(&mut self, channel: InputChannel) {
        // channel address: 00 input, 10 HF crystal, 11 LF crystal
        let (ch1, ch0) = match channel {
            InputChannel::FreqInput => (false, false),
            InputChannel::HfCrystal => (true, false),
            InputChannel::LfCrystal => (true, true),
        };
        let _ = if ch0 { self.ch0.set_high() } else { self.ch0.set_low() };
        let _ = if ch1 { self.ch1.set_high() } else { self.ch1.set_low() };
    }

    fn set_divider(&mut self, div: u8) {
        let _ = if div > 1 {
            self.div.set_high()
        } else {
            self.div.set_low()
        };
    }

    fn release(&mut self) {
        let _ = self.div.set_low();
        let _ = self.ch0.set_low();
        let _ = self.ch1.set_low();
    }
}

pub fn frequency_counter<W, C, P, ST, D, I, S>(
    gate: &mut W,
    counter: &mut C,
    port: &mut P,
    stage: &mut ST,
    ranges: &mut RangeSet,
    pulses: &PulseAccumulator,
    gate_break: &BreakSignal,
    display: &mut D,
    input: &mut I,
    strings: &S,
    clock: Clock,
) where
    W: WaveTimer,
    C: PulseCounter,
    P: CounterPort,
    ST: InputStage,
    D: DisplaySurface,
    I: UserInput,
    S: Strings,
{
    display.clear();
    display.write_str(strings.lookup(Label::FreqCounter));

    gate.stop();
    gate.reset();
    gate.configure(WaveMode::Normal, OutputDrive::None);
    gate.clear_irq(TimerIrq::CompareA);
    gate.enable_irq(TimerIrq::CompareA);

    counter.stop();
    counter.reset();
    counter.clear_overflow_irq();
    counter.enable_overflow_irq();

    ranges.select_highest();
    let mut channel = InputChannel::FreqInput;
    let mut update_channel = stage.channels() > 1;
    let mut update_range = true;
    let mut gate_top = 0u16;
    let mut gate_bits = 0u8;
    let mut run = true;

    while run {
        if update_range {
            let window = ranges.current();
            let entry = TIMER1_PRESCALERS.entry_at(window.prescaler_index);
            gate_top = clock.gate_top(window.gate_ms, entry.divisor);
            gate_bits = entry.bits;
            stage.set_divider(window.input_div);
            update_range = false;
        }

        if update_channel {
            stage.select(channel);
            display.clear_line(3);
            display.write_str(strings.lookup(Label::Channel));
            display.write_space();
            display.write_str(strings.lookup(channel.label()));
            update_channel = false;
        }

        port.listen();

        // arm one gate window; stale flags must not end it early
        pulses.clear();
        gate_break.clear();
        gate.clear_irq(TimerIrq::CompareA);
        counter.clear_overflow_irq();
        counter.reset();
        gate.reset();
        gate.set_compare(CompareChannel::A, gate_top);
        gate.start(gate_bits);
        counter.start(Edge::Falling);

        let mut window_done = false;
        let mut waiting = true;
        while waiting {
            if !gate.is_running() {
                // frozen by the gate interrupt: the window is complete
                window_done = true;
                waiting = false;
            } else {
                match input.poll(0, OPT_DOUBLE_PRESS) {
                    KeyEvent::DoublePress => {
                        run = false;
                        waiting = false;
                    }
                    KeyEvent::ShortPress | KeyEvent::RotateRight if stage.channels() > 1 => {
                        channel = channel.next();
                        update_channel = true;
                        waiting = false;
                    }
                    KeyEvent::RotateLeft if stage.channels() > 1 => {
                        channel = channel.prev();
                        update_channel = true;
                        waiting = false;
                    }
                    _ => {}
                }
            }
        }

        if !window_done {
            // left the window early: freeze the timers ourselves
            gate.stop();
            counter.stop();
        }

        port.restore();
        gate_break.clear();

        if !run {
            break;
        }

        display.clear_line(2);
        display.write_char('f');
        display.write_space();

        if window_done {
            let total = pulses.collect(counter.count());
            let window = *ranges.current();
            match ranges.classify(total) {
                RangeStep::Accept => {
                    // f = pulses * input divider / gate time, in wide
                    // arithmetic so megahertz counts cannot overflow
                    let freq64 =
                        total as u64 * 1000 * window.input_div as u64 / window.gate_ms as u64;
                    let freq = if freq64 > u32::MAX as u64 {
                        u32::MAX
                    } else {
                        freq64 as u32
                    };

                    let (places, prefix) = if freq >= 1_000_000 {
                        (6i8, Some('M'))
                    } else if freq >= 1000 {
                        (3i8, Some('k'))
                    } else {
                        (0i8, None)
                    };
                    display.write_value(freq, -places, prefix);
                    display.write_str(strings.lookup(Label::Hertz));
                }
                RangeStep::SwitchedUp | RangeStep::SwitchedDown => {
                    // no value for the window that triggered the switch
                    display.write_char('-');
                    update_range = true;
                }
            }
        } else {
            display.write_char('-');
        }
    }

    // clean up
    gate.stop();
    counter.stop();
    gate.disable_irq(TimerIrq::CompareA);
    gate.clear_irq(TimerIrq::CompareA);
    counter.disable_overflow_irq();
    counter.clear_overflow_irq();
    stage.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{
        SimAction, SimCounterInput, SimCounterPort, SimPulseCounter, SimState, SimWaveTimer,
        TestScreen,
    };
    use crate::ui::strings::English;

    const CLOCK: Clock = Clock::new(16_000_000);

    struct Run {
        state: SimState,
        screen: TestScreen,
        range_index: u8,
    }

    fn run_counter(mut ranges: RangeSet, script: Vec<SimAction>) -> Run {
        let state = SimState::shared();
        let pulses = PulseAccumulator::new();
        let gate_break = BreakSignal::new();
        let mut gate = SimWaveTimer::new(&state);
        let mut counter = SimPulseCounter::new(&state);
        let mut port = SimCounterPort::new(&state);
        let mut screen = TestScreen::new();
        let mut input = SimCounterInput::new(&state, &pulses, &gate_break, script);
        frequency_counter(
            &mut gate,
            &mut counter,
            &mut port,
            &mut DirectInput,
            &mut ranges,
            &pulses,
            &gate_break,
            &mut screen,
            &mut input,
            &English,
            CLOCK,
        );
        Run {
            state: state.snapshot(),
            screen,
            range_index: ranges.index(),
        }
    }

    #[test]
    fn known_pulse_count_reports_the_source_frequency() {
        // highest basic range: 10 ms gate; 5000 pulses = 500 kHz
        let run = run_counter(
            RangeSet::basic(CLOCK),
            vec![SimAction::Gate { pulses: 5000 }, SimAction::Exit],
        );
        assert_eq!(run.screen.line(2), "f 500.000kHz");
    }

    #[test]
    fn low_frequency_walks_down_the_ladder_then_reports() {
        // 400 Hz: 4 pulses in 10 ms, 40 in 100 ms, 400 in 1000 ms
        let run = run_counter(
            RangeSet::basic(CLOCK),
            vec![
                SimAction::Gate { pulses: 4 },
                SimAction::Gate { pulses: 40 },
                SimAction::Gate { pulses: 400 },
                SimAction::Exit,
            ],
        );
        assert_eq!(run.range_index, 0);
        assert_eq!(run.screen.line(2), "f 400Hz");
    }

    #[test]
    fn switched_windows_display_no_value() {
        let run = run_counter(
            RangeSet::basic(CLOCK),
            vec![SimAction::Gate { pulses: 4 }, SimAction::Exit],
        );
        // the out-of-band window switched the range and reported nothing
        assert_eq!(run.range_index, 1);
        assert_eq!(run.screen.line(2), "f -");
    }

    #[test]
    fn gate_window_arms_the_right_top_value() {
        let run = run_counter(
            RangeSet::basic(CLOCK),
            vec![SimAction::Gate { pulses: 5000 }, SimAction::Exit],
        );
        // highest range: 10 ms at 1:8 on a 16 MHz clock
        assert_eq!(run.state.wave.compare_a, 20_000);
        assert_eq!(run.state.wave.prescaler_bits, 0b010);
    }

    #[test]
    fn overflowed_counts_use_the_accumulator() {
        // 30000 pulses overflows the 8-bit counter 117 times
        let run = run_counter(
            RangeSet::basic(CLOCK),
            vec![SimAction::Gate { pulses: 30_000 }, SimAction::Exit],
        );
        assert_eq!(run.screen.line(2), "f 3.000000MHz");
    }

    #[test]
    fn early_exit_freezes_the_timers() {
        let run = run_counter(RangeSet::basic(CLOCK), vec![SimAction::Exit]);
        assert!(!run.state.wave.running);
        assert!(!run.state.counter.running);
        assert!(!run.state.wave.irq_compare_a);
        assert!(!run.state.counter.irq_overflow);
        assert!(run.state.counter_port_restored);
    }

    #[test]
    fn mock_pins_track_the_input_stage() {
        use embedded_hal_mock::pin::{
            Mock as PinMock, State as PinState, Transaction as PinTransaction,
        };

        let div = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let ch0 = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
        ]);
        let ch1 = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);

        let mut stage = CounterControl::new(div, ch0, ch1);
        stage.set_divider(16);
        stage.select(InputChannel::HfCrystal);
        stage.release();

        let CounterControl { mut div, mut ch0, mut ch1 } = stage;
        div.done();
        ch0.done();
        ch1.done();
    }
}
