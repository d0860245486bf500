use std::time::Duration;

use unicode_width::UnicodeWidthChar;

use crate::runtime::Pause;

pub const LCD_COLS: usize = 16;
pub const LCD_ROWS: usize = 2;

/// Text sink with cursor positioning; no logic of its own.
pub trait Display {
    fn clear(&mut self);
    fn set_cursor(&mut self, col: usize, row: usize);
    fn print(&mut self, text: &str);

    /// Connection status LED next to the display
    fn set_status_led(&mut self, _on: bool) {}
}

/// In-memory 16x2 character display.
///
/// Printing past the last column drops the overflow. The glyph ROM only has
/// single-cell characters, so wide or zero-width input is replaced with `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdBuffer {
    cells: [[char; LCD_COLS]; LCD_ROWS],
    cursor: (usize, usize),
    status_led: bool,
}

impl Default for LcdBuffer {
    fn default() -> Self {
        Self {
            cells: [[' '; LCD_COLS]; LCD_ROWS],
            cursor: (0, 0),
            status_led: false,
        }
    }
}

impl LcdBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row contents with trailing blanks removed
    pub fn row(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| cells.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    /// Row contents padded to the full display width
    pub fn raw_row(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| cells.iter().collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> [String; LCD_ROWS] {
        [self.row(0), self.row(1)]
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn status_led(&self) -> bool {
        self.status_led
    }
}

impl Display for LcdBuffer {
    fn clear(&mut self) {
        self.cells = [[' '; LCD_COLS]; LCD_ROWS];
        self.cursor = (0, 0);
    }

    fn set_cursor(&mut self, col: usize, row: usize) {
        self.cursor = (col.min(LCD_COLS), row.min(LCD_ROWS - 1));
    }

    fn print(&mut self, text: &str) {
        let (mut col, row) = self.cursor;
        for c in text.chars() {
            if col >= LCD_COLS {
                break;
            }
            let glyph = match c.width() {
                Some(1) => c,
                _ => '?',
            };
            self.cells[row][col] = glyph;
            col += 1;
        }
        self.cursor = (col, row);
    }

    fn set_status_led(&mut self, on: bool) {
        self.status_led = on;
    }
}

/// Screen-level helper over a [`Display`] and the loop's [`Pause`].
pub struct Panel<D: Display, P: Pause> {
    display: D,
    pause: P,
    held: bool,
}

impl<D: Display, P: Pause> Panel<D, P> {
    pub fn new(display: D, pause: P) -> Self {
        Self {
            display,
            pause,
            held: false,
        }
    }

    /// Replace the whole screen with two lines.
    pub fn show(&mut self, top: &str, bottom: &str) {
        self.display.clear();
        self.display.set_cursor(0, 0);
        self.display.print(top);
        if !bottom.is_empty() {
            self.display.set_cursor(0, 1);
            self.display.print(bottom);
        }
    }

    /// Overwrite one row in place, leaving the other untouched.
    pub fn print_row(&mut self, row: usize, text: &str) {
        self.display.set_cursor(0, row);
        self.display.print(text);
    }

    /// Append at the current cursor position.
    pub fn append(&mut self, text: &str) {
        self.display.print(text);
    }

    /// Keep whatever is on screen for `duration`.
    pub fn hold(&mut self, duration: Duration) {
        self.pause.pause(duration);
        self.held = true;
    }

    /// Whether a message was held since the last call; clears the flag.
    pub fn take_held(&mut self) -> bool {
        std::mem::take(&mut self.held)
    }

    pub fn set_status_led(&mut self, on: bool) {
        self.display.set_status_led(on);
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn pause(&self) -> &P {
        &self.pause
    }

    pub fn into_parts(self) -> (D, P) {
        (self.display, self.pause)
    }
}
