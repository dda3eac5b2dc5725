pub mod display;
pub mod input;
pub mod serial;
pub mod strings;

pub use display::{mark_item, DisplaySurface};
pub use input::{KeyEvent, UserInput, OPT_CURSOR_BLINK, OPT_DOUBLE_PRESS};
pub use serial::SerialDisplay;
pub use strings::{English, Label, Strings};
