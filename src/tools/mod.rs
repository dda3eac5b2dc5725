pub mod event_counter;
pub mod freq_counter;
pub mod probe;
pub mod pwm;
pub mod servo;
pub mod squarewave;

pub use event_counter::{event_counter, CounterMode, CounterSession};
pub use freq_counter::{frequency_counter, CounterControl, DirectInput, InputChannel, InputStage};
pub use probe::{CounterPort, SignalPort};
pub use pwm::pwm_tool;
pub use servo::{servo_tool, Sweep, SweepDir};
pub use squarewave::squarewave_tool;
