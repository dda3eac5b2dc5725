//! Serial mirror of the display surface.
//!
//! Renders the character surface onto any text sink, line by line; used
//! for headless debugging and for copying tool output to a terminal.

use ufmt::uWrite;

use crate::ui::display::DisplaySurface;

pub struct SerialDisplay<W: uWrite> {
    sink: W,
}

impl<W: uWrite> SerialDisplay<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: uWrite> DisplaySurface for SerialDisplay<W> {
    fn clear(&mut self) {
        let _ = self.sink.write_str("\r\n\r\n");
    }

    fn clear_line(&mut self, _line: u8) {
        let _ = self.sink.write_str("\r\n");
    }

    fn set_cursor(&mut self, _x: u8, _y: u8) {
        // a character stream has no addressable cursor
    }

    fn write_char(&mut self, c: char) {
        let _ = self.sink.write_char(c);
    }
}
