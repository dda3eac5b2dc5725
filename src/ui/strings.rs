//! Symbolic keys into the localized string tables.
//!
//! The translated tables themselves are maintained with the display
//! firmware; the built-in English table keeps the core usable stand-alone.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Label {
    Pwm,
    SquareWave,
    Servo,
    Sweep,
    FreqCounter,
    EventCounter,
    Hertz,
    Start,
    Stop,
    CountMode,
    TimeMode,
    EventsMode,
    Channel,
    FreqInput,
    HfCrystal,
    LfCrystal,
}

pub trait Strings {
    fn lookup(&self, label: Label) -> &'static str;
}

pub struct English;

impl Strings for English {
    fn lookup(&self, label: Label) -> &'static str {
        match label {
            Label::Pwm => "PWM",
            Label::SquareWave => "Square Wave",
            Label::Servo => "Servo",
            Label::Sweep => "Sweep",
            Label::FreqCounter => "Freq. Counter",
            Label::EventCounter => "Event Counter",
            Label::Hertz => "Hz",
            Label::Start => "Start",
            Label::Stop => "Stop",
            Label::CountMode => "Count",
            Label::TimeMode => "Time",
            Label::EventsMode => "Events",
            Label::Channel => "Ch",
            Label::FreqInput => "Input",
            Label::HfCrystal => "HF osc",
            Label::LfCrystal => "LF osc",
        }
    }
}
