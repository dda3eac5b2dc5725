//! Event counter.
//!
//! Counts edges on the counter input while a CTC timer ticks five times a
//! second. Each tick interrupt updates the elapsed time, raises the break
//! signal and thereby drives the management step in the foreground loop:
//! refresh the totals, check the stop triggers, saturate instead of
//! wrapping. Three modes: free-running count, count events for a given
//! time, take the time for a given number of events.

use crate::config::{Clock, TICKS_PER_SECOND};
use crate::hal::prescale::TIMER1_PRESCALERS;
use crate::hal::pulse::{PulseAccumulator, TickCounter};
use crate::hal::sync::BreakSignal;
use crate::hal::timer::{CompareChannel, Edge, OutputDrive, PulseCounter, TimerIrq, WaveMode, WaveTimer};
use crate::tools::probe::CounterPort;
use crate::ui::display::{mark_item, DisplaySurface};
use crate::ui::input::{KeyEvent, UserInput, OPT_DOUBLE_PRESS};
use crate::ui::strings::{Label, Strings};

pub const MAX_TIME_S: u16 = 43_200; // 12 h
pub const MAX_EVENTS: u32 = 4_000_000_000;

const DEFAULT_TIME_S: u16 = 60;
const DEFAULT_EVENTS: u32 = 100;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CounterMode {
    /// Count events and time until stopped by hand
    Count,
    /// Count events for a given time
    Time,
    /// Take the time for a given number of events
    Events,
}

impl CounterMode {
    fn label(self) -> Label {
        match self {
            CounterMode::Count => Label::CountMode,
            CounterMode::Time => Label::TimeMode,
            CounterMode::Events => Label::EventsMode,
        }
    }

    fn next(self) -> Self {
        match self {
            CounterMode::Count => CounterMode::Time,
            CounterMode::Time => CounterMode::Events,
            CounterMode::Events => CounterMode::Count,
        }
    }

    fn prev(self) -> Self {
        match self {
            CounterMode::Count => CounterMode::Events,
            CounterMode::Time => CounterMode::Count,
            CounterMode::Events => CounterMode::Time,
        }
    }
}

/// Session settings and totals.
pub struct CounterSession {
    pub mode: CounterMode,
    pub events: u32,
    pub events_trigger: u32,
    pub time_trigger: u16,
}

impl CounterSession {
    pub fn new() -> Self {
        Self {
            mode: CounterMode::Count,
            events: 0,
            events_trigger: DEFAULT_EVENTS,
            time_trigger: DEFAULT_TIME_S,
        }
    }

    /// Trigger check, run once per tick. Saturation limits apply in every
    /// mode so the 32-bit totals can never wrap.
    pub fn should_stop(&self, seconds: u16, events: u32) -> bool {
        if seconds >= MAX_TIME_S || events >= MAX_EVENTS {
            return true;
        }
        match self.mode {
            CounterMode::Count => false,
            CounterMode::Time => seconds >= self.time_trigger,
            CounterMode::Events => events >= self.events_trigger,
        }
    }
}

impl Default for CounterSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Item {
    Mode,
    Events,
    Time,
    StartStop,
}

/// UI item order with the per-mode skips: fields that do not apply to the
/// selected mode are not stops on the way to start/stop.
fn next_item(item: Item, mode: CounterMode) -> Item {
    match item {
        Item::Mode => match mode {
            CounterMode::Count => Item::StartStop,
            CounterMode::Time => Item::Time,
            CounterMode::Events => Item::Events,
        },
        Item::Events => Item::StartStop,
        Item::Time => Item::StartStop,
        Item::StartStop => Item::Mode,
    }
}

fn time_step(velocity: u8) -> u16 {
    match velocity {
        0..=1 => 1,
        2..=3 => 10,
        4..=5 => 120,
        _ => 1800,
    }
}

fn events_step(velocity: u8) -> u32 {
    match velocity {
        0..=1 => 1,
        2..=3 => 10,
        4..=5 => 100,
        _ => 1000,
    }
}

pub fn event_counter<W, C, P, D, I, S>(
    tick: &mut W,
    counter: &mut C,
    port: &mut P,
    pulses: &PulseAccumulator,
    ticks: &TickCounter,
    tick_break: &BreakSignal,
    display: &mut D,
    input: &mut I,
    strings: &S,
    clock: Clock,
) where
    W: WaveTimer,
    C: PulseCounter,
    P: CounterPort,
    D: DisplaySurface,
    I: UserInput,
    S: Strings,
{
    display.clear();
    display.write_str(strings.lookup(Label::EventCounter));

    // tick timer: CTC, 0.2 s per compare match at prescaler 1:256
    let tick_entry = TIMER1_PRESCALERS.entry_at(3);
    let tick_top = clock.tick_top(TICKS_PER_SECOND, tick_entry.divisor);
    tick.stop();
    tick.reset();
    tick.configure(WaveMode::Ctc, OutputDrive::None);
    tick.set_top(tick_top);
    tick.set_compare(CompareChannel::B, tick_top);
    tick.clear_irq(TimerIrq::CompareA);
    tick.clear_irq(TimerIrq::CompareB);
    tick.enable_irq(TimerIrq::CompareB);

    counter.stop();
    counter.reset();
    counter.clear_overflow_irq();
    counter.enable_overflow_irq();

    // the event input is a dedicated pin, listen for the whole session
    port.listen();

    let mut session = CounterSession::new();
    let mut item = Item::Mode;
    let mut idle = true;
    let mut run = true;
    let mut starting = false;
    let mut stopping = false;
    let mut manage = false;
    let mut show_mode = true;
    let mut show_events = true;
    let mut show_time = true;
    let mut show_startstop = true;
    let mut last = KeyEvent::None;

    while run {
        if starting {
            pulses.clear();
            ticks.clear();
            session.events = 0;
            counter.reset();
            tick.reset();
            tick_break.clear();
            tick.clear_irq(TimerIrq::CompareB);
            counter.clear_overflow_irq();

            tick.start(tick_entry.bits);
            counter.start(Edge::Rising);

            idle = false;
            starting = false;
            show_events = true;
            show_time = true;
        }

        if manage {
            // time bookkeeping happens in the tick interrupt
            session.events = pulses.sample(counter);

            if session.should_stop(ticks.seconds(), session.events) {
                stopping = true;
            }

            manage = false;
            if ticks.at_second_boundary() {
                show_events = true;
                show_time = true;
            }
        }

        if stopping {
            tick.stop();
            counter.stop();
            session.events = pulses.collect(counter.count());
            show_events = true;
            show_time = true;
            show_startstop = true;
        }

        if show_mode {
            display.clear_line(2);
            mark_item(display, item == Item::Mode);
            display.write_str(strings.lookup(session.mode.label()));
            show_mode = false;
            show_events = true;
            show_time = true;
        }

        if show_events {
            display.clear_line(3);
            mark_item(display, item == Item::Events);
            display.write_char('n');
            display.write_space();
            if idle {
                if session.mode == CounterMode::Events {
                    display.write_value(session.events_trigger, 0, None);
                }
            } else {
                display.write_value(session.events, 0, None);
            }
            show_events = false;
        }

        if show_time {
            display.clear_line(4);
            mark_item(display, item == Item::Time);
            display.write_char('t');
            display.write_space();
            if idle {
                if session.mode == CounterMode::Time {
                    display.write_value(session.time_trigger as u32, 0, Some('s'));
                }
            } else {
                display.write_value(ticks.seconds() as u32, 0, Some('s'));
            }
            show_time = false;
        }

        if stopping {
            stopping = false;
            idle = true;
            show_startstop = true;
        }

        if show_startstop {
            display.clear_line(5);
            mark_item(display, item == Item::StartStop);
            display.write_str(strings.lookup(if idle { Label::Start } else { Label::Stop }));
            show_startstop = false;
        }

        if last == KeyEvent::LongPress {
            input.smooth_long_press();
        }

        last = input.poll(0, OPT_DOUBLE_PRESS);
        let velocity = input.rotation_velocity();

        match last {
            KeyEvent::TimedOut => {
                // woken by the tick interrupt
                manage = true;
            }
            KeyEvent::ShortPress => {
                if idle {
                    let old = item;
                    item = next_item(item, session.mode);
                    show_item(old, &mut show_mode, &mut show_events, &mut show_time, &mut show_startstop);
                    show_item(item, &mut show_mode, &mut show_events, &mut show_time, &mut show_startstop);
                }
            }
            KeyEvent::LongPress => match item {
                Item::StartStop => {
                    if idle {
                        starting = true;
                    } else {
                        stopping = true;
                    }
                }
                Item::Events => {
                    session.events_trigger = DEFAULT_EVENTS;
                    show_events = true;
                }
                Item::Time => {
                    session.time_trigger = DEFAULT_TIME_S;
                    show_time = true;
                }
                Item::Mode => {}
            },
            KeyEvent::DoublePress => {
                run = false;
            }
            KeyEvent::RotateRight => match item {
                Item::Mode => {
                    session.mode = session.mode.next();
                    show_mode = true;
                }
                Item::Events => {
                    session.events_trigger =
                        session.events_trigger.saturating_add(events_step(velocity)).min(MAX_EVENTS);
                    show_events = true;
                }
                Item::Time => {
                    session.time_trigger =
                        session.time_trigger.saturating_add(time_step(velocity)).min(MAX_TIME_S);
                    show_time = true;
                }
                Item::StartStop => {}
            },
            KeyEvent::RotateLeft => match item {
                Item::Mode => {
                    session.mode = session.mode.prev();
                    show_mode = true;
                }
                Item::Events => {
                    session.events_trigger = session.events_trigger.saturating_sub(events_step(velocity));
                    show_events = true;
                }
                Item::Time => {
                    session.time_trigger = session.time_trigger.saturating_sub(time_step(velocity));
                    show_time = true;
                }
                Item::StartStop => {}
            },
            _ => {}
        }
    }

    // clean up
    tick.stop();
    counter.stop();
    tick.disable_irq(TimerIrq::CompareB);
    tick.clear_irq(TimerIrq::CompareB);
    counter.disable_overflow_irq();
    counter.clear_overflow_irq();
    port.restore();
}

fn show_item(
    item: Item,
    show_mode: &mut bool,
    show_events: &mut bool,
    show_time: &mut bool,
    show_startstop: &mut bool,
) {
    match item {
        Item::Mode => *show_mode = true,
        Item::Events => *show_events = true,
        Item::Time => *show_time = true,
        Item::StartStop => *show_startstop = true,
    }
}
