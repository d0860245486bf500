//! Text shown on the 16x2 display, one function per screen.

pub const MENU: (&str, &str) = ("1.Feedback 2.Avg", "3.Fetch");
pub const COUNT_PROMPT: (&str, &str) = ("Enter students:", "B:OK C:Back");
pub const START: &str = "Start feedback";
pub const INVALID_COUNT: &str = "Invalid number!";
pub const NEXT_STUDENT: &str = "Next student...";
pub const CONFIRM_HINT: &str = "A:OK B:Cancel";

pub const CONNECTING: &str = "Connecting WiFi";
pub const CONNECTED: &str = "WiFi Connected";
pub const CONNECT_FAILED: &str = "WiFi Failed";
pub const NETWORK_ERROR: &str = "WiFi Error";
pub const SENT: &str = "Sent to Sheet!";
pub const SEND_FAILED: &str = "Send Failed!";
pub const FETCHED: &str = "Fetched Avg:";
pub const FETCH_FAILED: &str = "Fetch Failed!";

/// Accumulating count, padded so a shorter redraw wipes leftovers
pub fn count(digits: &str) -> String {
    format!("Count: {digits}    ")
}

pub fn rate_prompt(student_number: u32) -> (&'static str, String) {
    ("Rate (1 to 5):", format!("Student {student_number}"))
}

pub fn chose(rating: u8) -> String {
    format!("You chose: {rating}")
}

pub fn saved(rating: u8) -> String {
    format!("Saved: {rating}")
}

pub fn average(value: f64) -> String {
    format!("Avg: {value:.2}")
}

pub fn fetched(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LCD_COLS;

    #[test]
    fn fixed_messages_fit_the_display() {
        for text in [
            MENU.0,
            MENU.1,
            COUNT_PROMPT.0,
            COUNT_PROMPT.1,
            START,
            INVALID_COUNT,
            NEXT_STUDENT,
            CONFIRM_HINT,
            CONNECTING,
            CONNECTED,
            CONNECT_FAILED,
            NETWORK_ERROR,
            SENT,
            SEND_FAILED,
            FETCHED,
            FETCH_FAILED,
        ] {
            assert!(text.len() <= LCD_COLS, "{text:?} overflows");
        }
    }

    #[test]
    fn averages_use_two_decimals() {
        assert_eq!(average(3.0), "Avg: 3.00");
        assert_eq!(average(2.666_666), "Avg: 2.67");
        assert_eq!(fetched(4.25), "4.25");
    }

    #[test]
    fn prompts_carry_numbers() {
        assert_eq!(rate_prompt(3), ("Rate (1 to 5):", "Student 3".to_string()));
        assert_eq!(chose(5), "You chose: 5");
        assert_eq!(saved(2), "Saved: 2");
        assert_eq!(count("12"), "Count: 12    ");
    }
}
