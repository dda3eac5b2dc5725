pub mod prescale;
pub mod pulse;
pub mod sync;
pub mod timer;

#[cfg(target_arch = "avr")]
pub mod atmega;
#[cfg(target_arch = "avr")]
pub mod gpio;

#[cfg(test)]
pub mod sim;

// Re-export commonly used types
pub use prescale::{PrescalerEntry, PrescalerTable, TIMER1_PRESCALERS};
pub use pulse::{PulseAccumulator, TickCounter};
pub use sync::{BreakSignal, IrqCell};
pub use timer::{
    CompareChannel, Edge, OutputDrive, PulseCounter, SweepTimer, TimerIrq, WaveMode, WaveTimer,
};
