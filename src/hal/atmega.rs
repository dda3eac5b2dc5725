//! ATmega328P backend: timer register access, probe wiring, the test key
//! and the interrupt handlers.
//!
//! This is the only translation unit with bit-level register knowledge;
//! everything above it goes through the traits in `hal::timer` and
//! `tools::probe`.

use avr_device::atmega328p::{tc0, tc1, PORTB, PORTC, PORTD, TC0, TC1, USART0};

use crate::config::{CLOCK, TICKS_PER_SECOND};
use crate::hal::pulse::{PulseAccumulator, TickCounter};
use crate::hal::sync::{BreakSignal, IrqCell};
use crate::hal::timer::{
    CompareChannel, Edge, OutputDrive, PulseCounter, SweepTimer, TimerIrq, WaveMode, WaveTimer,
};
use crate::tools::probe::{CounterPort, SignalPort};
use crate::tools::servo::{sweep_advance, Sweep};
use crate::ui::input::{KeyEvent, UserInput, OPT_DOUBLE_PRESS};

// Shared between the interrupt handlers and the foreground tools
pub static PULSES: PulseAccumulator = PulseAccumulator::new();
pub static TICKS: TickCounter = TickCounter::new(TICKS_PER_SECOND);
pub static GATE_BREAK: BreakSignal = BreakSignal::new();
pub static SWEEP: IrqCell<Sweep> = IrqCell::new(Sweep::slowest());

const CS_MASK: u8 = 0x07;

// TCCR1A
const WGM10: u8 = 1 << 0;
const WGM11: u8 = 1 << 1;
const COM1B0: u8 = 1 << 4;
const COM1B1: u8 = 1 << 5;
// TCCR1B
const WGM12: u8 = 1 << 3;
const WGM13: u8 = 1 << 4;
// TIMSK1 / TIFR1
const TOIE1: u8 = 1 << 0;
const OCIE1A: u8 = 1 << 1;
const OCIE1B: u8 = 1 << 2;
// TIMSK0 / TIFR0
const TOIE0: u8 = 1 << 0;
const OCIE0A: u8 = 1 << 1;
// TCCR0A / TCCR0B
const WGM01: u8 = 1 << 1;
const T0_FALLING: u8 = 0b110;
const T0_RISING: u8 = 0b111;
const T0_DIV1024: u8 = 0b101;

fn tc1() -> &'static tc1::RegisterBlock {
    unsafe { &*TC1::ptr() }
}

fn tc0() -> &'static tc0::RegisterBlock {
    unsafe { &*TC0::ptr() }
}

/// 16-bit Timer1: waveform generation, gate timing, event ticks.
pub struct Timer1 {
    tccr1b_mode: u8,
}

impl Timer1 {
    pub fn new() -> Self {
        let t = tc1();
        unsafe {
            t.tccr1b.write(|w| w.bits(0));
            t.tccr1a.write(|w| w.bits(0));
            t.timsk1.write(|w| w.bits(0));
            t.tcnt1.write(|w| w.bits(0));
        }
        Self { tccr1b_mode: 0 }
    }
}

impl Default for Timer1 {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveTimer for Timer1 {
    fn configure(&mut self, mode: WaveMode, drive: OutputDrive) {
        let (a, b) = match mode {
            WaveMode::Normal => (0, 0),
            WaveMode::Ctc => (0, WGM12),
            WaveMode::PhaseCorrectPwm => (WGM11 | WGM10, WGM13),
            WaveMode::FastPwm => (WGM11 | WGM10, WGM13 | WGM12),
        };
        let com = match drive {
            OutputDrive::None => 0,
            OutputDrive::NonInverting => COM1B1,
            OutputDrive::Inverting => COM1B1 | COM1B0,
        };
        self.tccr1b_mode = b;

        let t = tc1();
        unsafe {
            t.tccr1a.write(|w| w.bits(a | com));
            t.tccr1b.write(|w| w.bits(self.tccr1b_mode)); // clock stays off
        }
    }

    fn set_top(&mut self, top: u16) {
        // all selected waveform modes take their top from OCR1A
        unsafe {
            tc1().ocr1a.write(|w| w.bits(top));
        }
    }

    fn set_compare(&mut self, channel: CompareChannel, value: u16) {
        let t = tc1();
        unsafe {
            match channel {
                CompareChannel::A => t.ocr1a.write(|w| w.bits(value)),
                CompareChannel::B => t.ocr1b.write(|w| w.bits(value)),
            }
        }
    }

    fn compare(&self, channel: CompareChannel) -> u16 {
        let t = tc1();
        match channel {
            CompareChannel::A => t.ocr1a.read().bits(),
            CompareChannel::B => t.ocr1b.read().bits(),
        }
    }

    fn reset(&mut self) {
        unsafe {
            tc1().tcnt1.write(|w| w.bits(0));
        }
    }

    fn start(&mut self, prescaler_bits: u8) {
        unsafe {
            tc1()
                .tccr1b
                .write(|w| w.bits(self.tccr1b_mode | (prescaler_bits & CS_MASK)));
        }
    }

    fn stop(&mut self) {
        unsafe {
            tc1().tccr1b.write(|w| w.bits(self.tccr1b_mode));
        }
    }

    fn is_running(&self) -> bool {
        tc1().tccr1b.read().bits() & CS_MASK != 0
    }

    fn enable_irq(&mut self, irq: TimerIrq) {
        unsafe {
            tc1().timsk1.modify(|r, w| w.bits(r.bits() | irq1_bit(irq)));
        }
    }

    fn disable_irq(&mut self, irq: TimerIrq) {
        unsafe {
            tc1().timsk1.modify(|r, w| w.bits(r.bits() & !irq1_bit(irq)));
        }
    }

    fn clear_irq(&mut self, irq: TimerIrq) {
        // interrupt flags clear on writing a one
        unsafe {
            tc1().tifr1.write(|w| w.bits(irq1_bit(irq)));
        }
    }
}

fn irq1_bit(irq: TimerIrq) -> u8 {
    match irq {
        TimerIrq::Overflow => TOIE1,
        TimerIrq::CompareA => OCIE1A,
        TimerIrq::CompareB => OCIE1B,
    }
}

/// 8-bit Timer0 clocked from the T0 pin: pulse/event counting.
pub struct Counter0;

impl Counter0 {
    pub fn new() -> Self {
        let t = tc0();
        unsafe {
            t.tccr0b.write(|w| w.bits(0));
            t.tccr0a.write(|w| w.bits(0));
            t.timsk0.write(|w| w.bits(0));
        }
        Self
    }
}

impl Default for Counter0 {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCounter for Counter0 {
    fn start(&mut self, edge: Edge) {
        let t = tc0();
        let bits = match edge {
            Edge::Rising => T0_RISING,
            Edge::Falling => T0_FALLING,
        };
        unsafe {
            t.tccr0a.write(|w| w.bits(0)); // normal count-up
            t.tccr0b.write(|w| w.bits(bits));
        }
    }

    fn stop(&mut self) {
        unsafe {
            tc0().tccr0b.write(|w| w.bits(0));
        }
    }

    fn reset(&mut self) {
        unsafe {
            tc0().tcnt0.write(|w| w.bits(0));
        }
    }

    fn count(&self) -> u16 {
        tc0().tcnt0.read().bits() as u16
    }

    fn is_running(&self) -> bool {
        tc0().tccr0b.read().bits() & CS_MASK != 0
    }

    fn enable_overflow_irq(&mut self) {
        unsafe {
            tc0().timsk0.modify(|r, w| w.bits(r.bits() | TOIE0));
        }
    }

    fn disable_overflow_irq(&mut self) {
        unsafe {
            tc0().timsk0.modify(|r, w| w.bits(r.bits() & !TOIE0));
        }
    }

    fn clear_overflow_irq(&mut self) {
        unsafe {
            tc0().tifr0.write(|w| w.bits(TOIE0));
        }
    }
}

/// 8-bit Timer0 as the servo sweep tick source (CTC at 1:1024).
pub struct Sweep0;

impl SweepTimer for Sweep0 {
    fn arm(&mut self, top: u8) {
        let t = tc0();
        unsafe {
            t.tccr0b.write(|w| w.bits(0));
            t.tcnt0.write(|w| w.bits(0));
            t.ocr0a.write(|w| w.bits(top));
            t.tccr0a.write(|w| w.bits(WGM01));
            t.tifr0.write(|w| w.bits(OCIE0A));
            t.timsk0.modify(|r, w| w.bits(r.bits() | OCIE0A));
        }
    }

    fn start(&mut self) {
        let t = tc0();
        unsafe {
            t.tcnt0.write(|w| w.bits(0));
            t.tccr0b.write(|w| w.bits(T0_DIV1024));
        }
    }

    fn stop(&mut self) {
        unsafe {
            tc0().tccr0b.write(|w| w.bits(0));
        }
    }

    fn disarm(&mut self) {
        let t = tc0();
        unsafe {
            t.tccr0b.write(|w| w.bits(0));
            t.timsk0.modify(|r, w| w.bits(r.bits() & !OCIE0A));
            t.tifr0.write(|w| w.bits(OCIE0A));
            t.tccr0a.write(|w| w.bits(0));
        }
    }
}

// probes 1/3 ground directly, probe 2 carries OC1B through Rl
const PROBE_GND_MASK: u8 = (1 << 0) | (1 << 2); // PC0, PC2
const SIGNAL_RL: u8 = 1 << 2; // PB2 = OC1B

/// Probe header wiring for the signal generators.
pub struct ProbeHeader;

impl SignalPort for ProbeHeader {
    fn drive_signal(&mut self) {
        unsafe {
            let c = &*PORTC::ptr();
            c.portc.modify(|r, w| w.bits(r.bits() & !PROBE_GND_MASK));
            c.ddrc.modify(|r, w| w.bits(r.bits() | PROBE_GND_MASK));

            let b = &*PORTB::ptr();
            b.portb.modify(|r, w| w.bits(r.bits() & !SIGNAL_RL));
            b.ddrb.modify(|r, w| w.bits(r.bits() | SIGNAL_RL));
        }
    }

    fn release(&mut self) {
        unsafe {
            let c = &*PORTC::ptr();
            c.ddrc.modify(|r, w| w.bits(r.bits() & !PROBE_GND_MASK));

            let b = &*PORTB::ptr();
            b.ddrb.modify(|r, w| w.bits(r.bits() & !SIGNAL_RL));
        }
    }
}

const COUNTER_IN: u8 = 1 << 4; // PD4 = T0, may be shared with the display

/// Counter input pin with direction save/restore.
pub struct CounterInput {
    was_output: bool,
}

impl CounterInput {
    pub fn new() -> Self {
        Self { was_output: false }
    }
}

impl Default for CounterInput {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterPort for CounterInput {
    fn listen(&mut self) {
        unsafe {
            let d = &*PORTD::ptr();
            self.was_output = d.ddrd.read().bits() & COUNTER_IN != 0;
            d.ddrd.modify(|r, w| w.bits(r.bits() & !COUNTER_IN));
        }
        settle_500us();
    }

    fn restore(&mut self) {
        if self.was_output {
            unsafe {
                (*PORTD::ptr()).ddrd.modify(|r, w| w.bits(r.bits() | COUNTER_IN));
            }
        }
    }
}

/// Input settle time after switching pin directions.
fn settle_500us() {
    // ~4 cycles per spin iteration
    let iterations = CLOCK.cycles_per_us() * 500 / 4;
    for _ in 0..iterations {
        core::hint::spin_loop();
    }
}

fn delay_1ms() {
    let iterations = CLOCK.cycles_per_us() * 1000 / 4;
    for _ in 0..iterations {
        core::hint::spin_loop();
    }
}

const LONG_PRESS_MS: u16 = 300;
const DOUBLE_GAP_MS: u16 = 250;
const DEBOUNCE_MS: u16 = 5;

const TEST_KEY: u8 = 1 << 7; // PD7, active low

/// Push-button input: short/long/double press classification on the test
/// key. Boards with a rotary encoder bring their own `UserInput`.
pub struct TestButton;

impl TestButton {
    pub fn new() -> Self {
        unsafe {
            let d = &*PORTD::ptr();
            d.ddrd.modify(|r, w| w.bits(r.bits() & !TEST_KEY));
            d.portd.modify(|r, w| w.bits(r.bits() | TEST_KEY)); // pull-up
        }
        Self
    }

    fn pressed(&self) -> bool {
        unsafe { (*PORTD::ptr()).pind.read().bits() & TEST_KEY == 0 }
    }

    /// Time until release, in ms.
    fn measure_press(&self) -> u16 {
        let mut held: u16 = 0;
        while self.pressed() {
            delay_1ms();
            held = held.saturating_add(1);
        }
        held
    }
}

impl Default for TestButton {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInput for TestButton {
    fn poll(&mut self, timeout_ms: u16, options: u8) -> KeyEvent {
        let mut waited: u16 = 0;
        loop {
            if GATE_BREAK.take() {
                return KeyEvent::TimedOut;
            }
            if timeout_ms > 0 && waited >= timeout_ms {
                return KeyEvent::TimedOut;
            }

            if self.pressed() {
                // debounce, then classify by press length
                let mut stable: u16 = 0;
                while stable < DEBOUNCE_MS && self.pressed() {
                    delay_1ms();
                    stable += 1;
                }
                if stable < DEBOUNCE_MS {
                    continue;
                }

                let held = stable + self.measure_press();
                if held >= LONG_PRESS_MS {
                    return KeyEvent::LongPress;
                }

                if options & OPT_DOUBLE_PRESS != 0 {
                    let mut gap: u16 = 0;
                    while gap < DOUBLE_GAP_MS {
                        if self.pressed() {
                            self.measure_press();
                            return KeyEvent::DoublePress;
                        }
                        delay_1ms();
                        gap += 1;
                    }
                }
                return KeyEvent::ShortPress;
            }

            delay_1ms();
            waited = waited.saturating_add(1);
        }
    }

    fn rotation_velocity(&self) -> u8 {
        1
    }

    fn smooth_long_press(&mut self) {
        for _ in 0..150 {
            delay_1ms();
        }
    }
}

/// Transmit-only debug serial, sink for the display mirror.
pub struct DebugSerial;

impl DebugSerial {
    const TXEN0: u8 = 1 << 3;
    const UDRE0: u8 = 1 << 5;

    pub fn init(baud: u32) -> Self {
        let usart = unsafe { &*USART0::ptr() };
        let ubrr = (CLOCK.hz() / (16 * baud)) - 1;
        unsafe {
            usart.ubrr0.write(|w| w.bits(ubrr as u16));
            usart.ucsr0b.write(|w| w.bits(Self::TXEN0));
            usart.ucsr0c.write(|w| w.bits(0x06)); // 8N1
        }
        Self
    }
}

impl ufmt::uWrite for DebugSerial {
    type Error = core::convert::Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        let usart = unsafe { &*USART0::ptr() };
        for byte in s.bytes() {
            while usart.ucsr0a.read().bits() & Self::UDRE0 == 0 {}
            unsafe {
                usart.udr0.write(|w| w.bits(byte));
            }
        }
        Ok(())
    }
}

/*
 * Interrupt handlers. Each runs to completion with interrupts disabled;
 * they only bump accumulators, freeze timers and raise the break signal,
 * which the foreground loop observes after its poll returns.
 */

#[avr_device::interrupt(atmega328p)]
fn TIMER0_OVF() {
    // pulse counter wrapped
    PULSES.record_overflow(256);
}

#[avr_device::interrupt(atmega328p)]
fn TIMER1_COMPA() {
    // gate time over: freeze both timers before the foreground reads them
    unsafe {
        tc1().tccr1b.write(|w| w.bits(0));
        tc0().tccr0b.write(|w| w.bits(0));
    }
    GATE_BREAK.raise();
}

#[avr_device::interrupt(atmega328p)]
fn TIMER1_COMPB() {
    TICKS.record_tick();
    // the unused compare A flag would linger forever in CTC mode
    unsafe {
        tc1().tifr1.write(|w| w.bits(OCIE1A));
    }
    GATE_BREAK.raise();
}

#[avr_device::interrupt(atmega328p)]
fn TIMER0_COMPA() {
    // sweep tick: walk the servo pulse width between 1.0 and 2.0 ms
    let lower = CLOCK.servo_toggle(10);
    let upper = CLOCK.servo_toggle(20);
    let t = tc1();
    let toggle = t.ocr1b.read().bits();
    let (next, sweep) = sweep_advance(toggle, SWEEP.get(), lower, upper);
    SWEEP.set(sweep);
    unsafe {
        t.ocr1b.write(|w| w.bits(next));
    }
}
