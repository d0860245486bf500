use ratatui::{
    backend::Backend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Terminal,
};
use tracing::warn;

use crate::display::{Display, LcdBuffer, LCD_COLS, LCD_ROWS};

const KEYPAD_LEGEND: [&str; 4] = ["1 2 3 A", "4 5 6 B", "7 8 9 C", "* 0 # D"];
const HELP: &str = "keys: 0-9 A-D * #  (enter = B, esc = quit)";

/// Draws the character display the way it looks on the device
pub struct LcdWidget<'a> {
    lcd: &'a LcdBuffer,
}

impl<'a> LcdWidget<'a> {
    pub fn new(lcd: &'a LcdBuffer) -> Self {
        Self { lcd }
    }
}

impl Widget for LcdWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let screen_style = Style::default()
            .fg(Color::Black)
            .bg(Color::Rgb(120, 200, 80))
            .add_modifier(Modifier::BOLD);
        let led_style = if self.lcd.status_led() {
            Style::default().fg(Color::LightBlue)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let lcd_height = LCD_ROWS as u16 + 2;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(lcd_height),
                Constraint::Length(1),
                Constraint::Length(KEYPAD_LEGEND.len() as u16),
                Constraint::Min(0),
            ])
            .split(area);

        let screen = Paragraph::new(
            (0..LCD_ROWS)
                .map(|row| Line::from(Span::styled(self.lcd.raw_row(row), screen_style)))
                .collect::<Vec<_>>(),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("feedpad"));
        screen.render(centered(chunks[0], LCD_COLS as u16 + 2), buf);

        Paragraph::new(Line::from(vec![
            Span::styled("● ", led_style),
            Span::raw("link"),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        Paragraph::new(
            KEYPAD_LEGEND
                .iter()
                .map(|row| Line::from(*row))
                .collect::<Vec<_>>(),
        )
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray))
        .render(chunks[2], buf);

        Paragraph::new(HELP)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            .render(chunks[3], buf);
    }
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

/// [`Display`] that mirrors every change onto a ratatui terminal
pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    lcd: LcdBuffer,
}

impl<B: Backend> TerminalDisplay<B> {
    pub fn new(terminal: Terminal<B>) -> Self {
        let mut display = Self {
            terminal,
            lcd: LcdBuffer::new(),
        };
        display.redraw();
        display
    }

    pub fn lcd(&self) -> &LcdBuffer {
        &self.lcd
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn redraw(&mut self) {
        let lcd = &self.lcd;
        if let Err(e) = self
            .terminal
            .draw(|f| f.render_widget(LcdWidget::new(lcd), f.area()))
        {
            warn!(error = %e, "terminal draw failed");
        }
    }
}

impl<B: Backend> Display for TerminalDisplay<B> {
    fn clear(&mut self) {
        self.lcd.clear();
        self.redraw();
    }

    fn set_cursor(&mut self, col: usize, row: usize) {
        self.lcd.set_cursor(col, row);
    }

    fn print(&mut self, text: &str) {
        self.lcd.print(text);
        self.redraw();
    }

    fn set_status_led(&mut self, on: bool) {
        self.lcd.set_status_led(on);
        self.redraw();
    }
}
