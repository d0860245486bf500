use std::num::NonZeroU32;

use crate::error::CountError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// One feedback collection run across a fixed number of students.
///
/// Only exists while collection is active. `pending_rating` holds a rating
/// that was entered but not yet confirmed; it never counts towards the sum.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    expected_count: NonZeroU32,
    current_index: u32,
    rating_sum: u32,
    pending_rating: Option<u8>,
}

impl Session {
    pub fn new(expected_count: NonZeroU32) -> Self {
        Self {
            expected_count,
            current_index: 0,
            rating_sum: 0,
            pending_rating: None,
        }
    }

    pub fn expected_count(&self) -> u32 {
        self.expected_count.get()
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    /// 1-based number of the student currently rating
    pub fn student_number(&self) -> u32 {
        self.current_index + 1
    }

    pub fn rating_sum(&self) -> u32 {
        self.rating_sum
    }

    pub fn pending_rating(&self) -> Option<u8> {
        self.pending_rating
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.expected_count.get()
    }

    /// Stage a rating for confirmation. Returns false when the rating is
    /// outside 1..=5, a rating is already pending, or the session is complete.
    pub fn choose(&mut self, rating: u8) -> bool {
        if self.pending_rating.is_some()
            || self.is_complete()
            || !(MIN_RATING..=MAX_RATING).contains(&rating)
        {
            return false;
        }
        self.pending_rating = Some(rating);
        true
    }

    /// Fold the pending rating into the sum and advance to the next student.
    pub fn accept(&mut self) -> Option<u8> {
        let rating = self.pending_rating.take()?;
        self.rating_sum += u32::from(rating);
        self.current_index += 1;
        Some(rating)
    }

    /// Drop the pending rating; the same student rates again.
    pub fn cancel(&mut self) -> Option<u8> {
        self.pending_rating.take()
    }

    /// Final average over the expected count; only meaningful once complete.
    pub fn average(&self) -> f64 {
        f64::from(self.rating_sum) / f64::from(self.expected_count.get())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            average: self.average(),
            count: self.expected_count.get(),
        }
    }
}

/// What a completed session leaves behind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub average: f64,
    pub count: u32,
}

/// Digits typed while asking how many students will rate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountEntry {
    digits: String,
}

impl CountEntry {
    pub fn push_digit(&mut self, digit: u8) {
        if digit <= 9 {
            self.digits.push(char::from(b'0' + digit));
        }
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn parse(&self) -> Result<NonZeroU32, CountError> {
        if self.digits.is_empty() {
            return Err(CountError::Empty);
        }
        let value: u32 = self
            .digits
            .parse()
            .map_err(|_| CountError::Invalid(self.digits.clone()))?;
        NonZeroU32::new(value).ok_or(CountError::Zero)
    }
}

/// Most recent locally computed average, kept until the next session completes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastResult {
    pub average: f64,
    pub count: u32,
}

impl LastResult {
    pub fn is_set(&self) -> bool {
        self.count > 0
    }
}

impl From<SessionSummary> for LastResult {
    fn from(s: SessionSummary) -> Self {
        Self {
            average: s.average,
            count: s.count,
        }
    }
}
