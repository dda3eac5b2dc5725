#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
#[avr_device::entry]
fn main() -> ! {
    use comptester_firmware::config::CLOCK;
    use comptester_firmware::hal::atmega::{
        Counter0, CounterInput, DebugSerial, ProbeHeader, Sweep0, TestButton, Timer1, GATE_BREAK,
        PULSES, SWEEP, TICKS,
    };
    use comptester_firmware::hal::gpio::board::{CounterCtrlCh0, CounterCtrlCh1, CounterCtrlDiv};
    use comptester_firmware::range::RangeSet;
    use comptester_firmware::tools::{
        event_counter, frequency_counter, pwm_tool, servo_tool, squarewave_tool, CounterControl,
        DirectInput,
    };
    use comptester_firmware::ui::display::DisplaySurface;
    use comptester_firmware::ui::input::{KeyEvent, UserInput};
    use comptester_firmware::ui::strings::{English, Label, Strings};
    use comptester_firmware::ui::SerialDisplay;

    let _dp = avr_device::atmega328p::Peripherals::take().unwrap();

    // tools keep their timers running while the poll loop idles
    unsafe { avr_device::interrupt::enable() };

    let mut display = SerialDisplay::new(DebugSerial::init(9600));
    let mut input = TestButton::new();
    let strings = English;

    let mut wave = Timer1::new();
    let mut counter = Counter0::new();
    let mut probes = ProbeHeader;
    let mut counter_pin = CounterInput::new();

    const TOOLS: [Label; 5] = [
        Label::Pwm,
        Label::SquareWave,
        Label::Servo,
        Label::FreqCounter,
        Label::EventCounter,
    ];
    let mut selected = 0usize;

    loop {
        display.clear();
        display.write_str(strings.lookup(TOOLS[selected]));

        // short press: next tool / long press: run it
        match input.poll(0, 0) {
            KeyEvent::ShortPress => {
                selected = (selected + 1) % TOOLS.len();
            }
            KeyEvent::LongPress => match TOOLS[selected] {
                Label::Pwm => {
                    pwm_tool(&mut wave, &mut probes, &mut display, &mut input, &strings, CLOCK);
                }
                Label::SquareWave => {
                    squarewave_tool(&mut wave, &mut probes, &mut display, &mut input, &strings, CLOCK);
                }
                Label::Servo => {
                    let mut sweep_timer = Sweep0;
                    servo_tool(
                        &mut wave,
                        &mut sweep_timer,
                        &SWEEP,
                        &mut probes,
                        &mut display,
                        &mut input,
                        &strings,
                        CLOCK,
                    );
                }
                Label::FreqCounter => {
                    // bring up the buffered front end when it is present
                    if cfg!(feature = "counter-frontend") {
                        let mut stage = CounterControl::new(
                            CounterCtrlDiv::new().into_output(),
                            CounterCtrlCh0::new().into_output(),
                            CounterCtrlCh1::new().into_output(),
                        );
                        let mut ranges = RangeSet::extended(CLOCK, 16);
                        frequency_counter(
                            &mut wave,
                            &mut counter,
                            &mut counter_pin,
                            &mut stage,
                            &mut ranges,
                            &PULSES,
                            &GATE_BREAK,
                            &mut display,
                            &mut input,
                            &strings,
                            CLOCK,
                        );
                    } else {
                        let mut ranges = RangeSet::basic(CLOCK);
                        frequency_counter(
                            &mut wave,
                            &mut counter,
                            &mut counter_pin,
                            &mut DirectInput,
                            &mut ranges,
                            &PULSES,
                            &GATE_BREAK,
                            &mut display,
                            &mut input,
                            &strings,
                            CLOCK,
                        );
                    }
                }
                Label::EventCounter => {
                    event_counter(
                        &mut wave,
                        &mut counter,
                        &mut counter_pin,
                        &PULSES,
                        &TICKS,
                        &GATE_BREAK,
                        &mut display,
                        &mut input,
                        &strings,
                        CLOCK,
                    );
                }
                _ => {}
            },
            _ => {}
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    // the firmware image only targets AVR; host builds carry the test suite
}
