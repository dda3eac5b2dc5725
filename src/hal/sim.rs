//! Simulated board for the host test suite.
//!
//! Reproduces the register-level protocol of the real backend: the
//! scripted input delivers key events, finished gate windows and counter
//! ticks, applying the same side effects (and in the same order) as the
//! interrupt handlers do on hardware: stop the timers, update the shared
//! accumulators, raise the break signal, and only then let the poll
//! return.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::hal::pulse::{PulseAccumulator, TickCounter};
use crate::hal::sync::BreakSignal;
use crate::hal::timer::{
    CompareChannel, Edge, OutputDrive, PulseCounter, SweepTimer, TimerIrq, WaveMode, WaveTimer,
};
use crate::tools::probe::{CounterPort, SignalPort};
use crate::ui::display::DisplaySurface;
use crate::ui::input::{KeyEvent, UserInput};

/// Registers of the simulated 16-bit timer.
#[derive(Clone, Default)]
pub struct WaveRegs {
    pub mode: Option<WaveMode>,
    pub drive: Option<OutputDrive>,
    pub top: u16,
    pub compare_a: u16,
    pub compare_b: u16,
    pub prescaler_bits: u8,
    pub running: bool,
    pub irq_overflow: bool,
    pub irq_compare_a: bool,
    pub irq_compare_b: bool,
}

/// Registers of the simulated pulse counter.
#[derive(Clone, Default)]
pub struct CounterRegs {
    pub running: bool,
    pub edge: Option<Edge>,
    pub count: u16,
    pub irq_overflow: bool,
}

/// State of the simulated sweep timer.
#[derive(Clone, Default)]
pub struct SweepRegs {
    pub armed: bool,
    pub top: u8,
    pub running: bool,
    /// ever started during the run
    pub started: bool,
    /// saw an explicit stop before the final disarm
    pub stopped_before_disarm: bool,
}

#[derive(Clone, Default)]
pub struct SimState {
    pub wave: WaveRegs,
    pub counter: CounterRegs,
    pub sweep_timer: SweepRegs,
    pub signal_driven: bool,
    pub counter_port_listening: bool,
    pub counter_port_restored: bool,
}

impl SimState {
    pub fn shared() -> SharedSim {
        SharedSim(Rc::new(RefCell::new(SimState::default())))
    }
}

#[derive(Clone)]
pub struct SharedSim(Rc<RefCell<SimState>>);

impl SharedSim {
    pub fn snapshot(&self) -> SimState {
        self.0.borrow().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

pub struct SimWaveTimer {
    state: SharedSim,
}

impl SimWaveTimer {
    pub fn new(state: &SharedSim) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl WaveTimer for SimWaveTimer {
    fn configure(&mut self, mode: WaveMode, drive: OutputDrive) {
        self.state.with(|s| {
            assert!(!s.wave.running, "mode change on a running timer");
            s.wave.mode = Some(mode);
            s.wave.drive = Some(drive);
        });
    }

    fn set_top(&mut self, top: u16) {
        self.state.with(|s| s.wave.top = top);
    }

    fn set_compare(&mut self, channel: CompareChannel, value: u16) {
        self.state.with(|s| match channel {
            CompareChannel::A => s.wave.compare_a = value,
            CompareChannel::B => s.wave.compare_b = value,
        });
    }

    fn compare(&self, channel: CompareChannel) -> u16 {
        self.state.with(|s| match channel {
            CompareChannel::A => s.wave.compare_a,
            CompareChannel::B => s.wave.compare_b,
        })
    }

    fn reset(&mut self) {}

    fn start(&mut self, prescaler_bits: u8) {
        self.state.with(|s| {
            s.wave.prescaler_bits = prescaler_bits;
            s.wave.running = true;
        });
    }

    fn stop(&mut self) {
        self.state.with(|s| s.wave.running = false);
    }

    fn is_running(&self) -> bool {
        self.state.with(|s| s.wave.running)
    }

    fn enable_irq(&mut self, irq: TimerIrq) {
        self.state.with(|s| match irq {
            TimerIrq::Overflow => s.wave.irq_overflow = true,
            TimerIrq::CompareA => s.wave.irq_compare_a = true,
            TimerIrq::CompareB => s.wave.irq_compare_b = true,
        });
    }

    fn disable_irq(&mut self, irq: TimerIrq) {
        self.state.with(|s| match irq {
            TimerIrq::Overflow => s.wave.irq_overflow = false,
            TimerIrq::CompareA => s.wave.irq_compare_a = false,
            TimerIrq::CompareB => s.wave.irq_compare_b = false,
        });
    }

    fn clear_irq(&mut self, _irq: TimerIrq) {}
}

pub struct SimPulseCounter {
    state: SharedSim,
}

impl SimPulseCounter {
    pub fn new(state: &SharedSim) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl PulseCounter for SimPulseCounter {
    fn start(&mut self, edge: Edge) {
        self.state.with(|s| {
            s.counter.edge = Some(edge);
            s.counter.running = true;
        });
    }

    fn stop(&mut self) {
        self.state.with(|s| s.counter.running = false);
    }

    fn reset(&mut self) {
        self.state.with(|s| s.counter.count = 0);
    }

    fn count(&self) -> u16 {
        self.state.with(|s| s.counter.count)
    }

    fn is_running(&self) -> bool {
        self.state.with(|s| s.counter.running)
    }

    fn enable_overflow_irq(&mut self) {
        self.state.with(|s| s.counter.irq_overflow = true);
    }

    fn disable_overflow_irq(&mut self) {
        self.state.with(|s| s.counter.irq_overflow = false);
    }

    fn clear_overflow_irq(&mut self) {}
}

pub struct SimSweepTimer {
    state: SharedSim,
}

impl SimSweepTimer {
    pub fn new(state: &SharedSim) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl SweepTimer for SimSweepTimer {
    fn arm(&mut self, top: u8) {
        self.state.with(|s| {
            s.sweep_timer.armed = true;
            s.sweep_timer.top = top;
            s.sweep_timer.running = false;
        });
    }

    fn start(&mut self) {
        self.state.with(|s| {
            s.sweep_timer.running = true;
            s.sweep_timer.started = true;
        });
    }

    fn stop(&mut self) {
        self.state.with(|s| {
            if s.sweep_timer.armed && s.sweep_timer.running {
                s.sweep_timer.stopped_before_disarm = true;
            }
            s.sweep_timer.running = false;
        });
    }

    fn disarm(&mut self) {
        self.state.with(|s| {
            s.sweep_timer.running = false;
            s.sweep_timer.armed = false;
        });
    }
}

pub struct SimSignalPort {
    state: SharedSim,
}

impl SimSignalPort {
    pub fn new(state: &SharedSim) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl SignalPort for SimSignalPort {
    fn drive_signal(&mut self) {
        self.state.with(|s| s.signal_driven = true);
    }

    fn release(&mut self) {
        self.state.with(|s| s.signal_driven = false);
    }
}

pub struct SimCounterPort {
    state: SharedSim,
}

impl SimCounterPort {
    pub fn new(state: &SharedSim) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl CounterPort for SimCounterPort {
    fn listen(&mut self) {
        self.state.with(|s| s.counter_port_listening = true);
    }

    fn restore(&mut self) {
        self.state.with(|s| {
            s.counter_port_listening = false;
            s.counter_port_restored = true;
        });
    }
}

/// Line-addressed test screen.
pub struct TestScreen {
    lines: Vec<String>,
    current: usize,
}

impl TestScreen {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new(); 8],
            current: 1,
        }
    }

    pub fn line(&self, n: u8) -> &str {
        &self.lines[n as usize]
    }
}

impl Default for TestScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for TestScreen {
    fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.current = 1;
    }

    fn clear_line(&mut self, line: u8) {
        self.lines[line as usize].clear();
        self.current = line as usize;
    }

    fn set_cursor(&mut self, _x: u8, y: u8) {
        self.current = y as usize;
    }

    fn write_char(&mut self, c: char) {
        self.lines[self.current].push(c);
    }
}

/// Scripted key events for the generator tools. An exhausted script exits
/// the tool so a test can never hang.
pub struct SimKeys {
    script: VecDeque<(KeyEvent, u8)>,
    velocity: u8,
}

impl SimKeys {
    pub fn new(script: Vec<(KeyEvent, u8)>) -> Self {
        Self {
            script: script.into(),
            velocity: 1,
        }
    }
}

impl UserInput for SimKeys {
    fn poll(&mut self, timeout_ms: u16, _options: u8) -> KeyEvent {
        // timed waits (the pinout banner) expire without consuming the
        // script; scripted events model the main loop's blocking polls
        if timeout_ms > 0 {
            return KeyEvent::TimedOut;
        }
        match self.script.pop_front() {
            Some((event, velocity)) => {
                self.velocity = velocity;
                event
            }
            None => KeyEvent::DoublePress,
        }
    }

    fn rotation_velocity(&self) -> u8 {
        self.velocity
    }
}

/// Scripted events for the counter tools.
pub enum SimAction {
    Key(KeyEvent, u8),
    /// The gate window closes with this many pulses counted: the gate
    /// interrupt freezes both timers, splits the pulses over the live
    /// counter and the overflow accumulator and raises the break signal.
    Gate { pulses: u32 },
    /// One tick interrupt with the counted total so far.
    Tick { total: u32 },
    /// Double press, i.e. leave the tool.
    Exit,
}

pub struct SimCounterInput<'a> {
    state: SharedSim,
    pulses: &'a PulseAccumulator,
    break_signal: &'a BreakSignal,
    ticks: Option<&'a TickCounter>,
    script: VecDeque<SimAction>,
    velocity: u8,
}

impl<'a> SimCounterInput<'a> {
    pub fn new(
        state: &SharedSim,
        pulses: &'a PulseAccumulator,
        break_signal: &'a BreakSignal,
        script: Vec<SimAction>,
    ) -> Self {
        Self {
            state: state.clone(),
            pulses,
            break_signal,
            ticks: None,
            script: script.into(),
            velocity: 1,
        }
    }

    pub fn with_ticks(mut self, ticks: &'a TickCounter) -> Self {
        self.ticks = Some(ticks);
        self
    }

    fn set_counted(&self, total: u32) {
        let live = total % 256;
        self.state.with(|s| s.counter.count = live as u16);
        self.pulses.clear();
        self.pulses.record_overflow(total - live);
    }
}

impl UserInput for SimCounterInput<'_> {
    fn poll(&mut self, _timeout_ms: u16, _options: u8) -> KeyEvent {
        match self.script.pop_front() {
            Some(SimAction::Key(event, velocity)) => {
                self.velocity = velocity;
                event
            }
            Some(SimAction::Gate { pulses }) => {
                self.set_counted(pulses);
                self.state.with(|s| {
                    s.wave.running = false;
                    s.counter.running = false;
                });
                self.break_signal.raise();
                KeyEvent::TimedOut
            }
            Some(SimAction::Tick { total }) => {
                self.set_counted(total);
                self.ticks.expect("tick action without a tick counter").record_tick();
                self.break_signal.raise();
                KeyEvent::TimedOut
            }
            Some(SimAction::Exit) | None => KeyEvent::DoublePress,
        }
    }

    fn rotation_velocity(&self) -> u8 {
        self.velocity
    }
}
