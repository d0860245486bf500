use tracing::{debug, info};

use crate::config::Timings;
use crate::display::{Display, Panel};
use crate::error::CountError;
use crate::keypad::Key;
use crate::messages;
use crate::runtime::Pause;
use crate::session::{CountEntry, Session, SessionSummary};

/// Observable state of the collection flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum State {
    Idle,
    CollectingCount,
    AwaitingRating,
    AwaitingConfirm,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    CountEntry(CountEntry),
    Collecting(Session),
}

/// What a key did to the machine, for the dispatcher to follow up on
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Key has no meaning in the current state
    Ignored,
    /// Stayed in the flow; the display was updated
    Updated,
    /// Count entry abandoned with `C`
    Aborted,
    /// Count entry confirmed with an unusable number
    Rejected(CountError),
    /// A session now exists; buffered presses must be dropped before prompting
    Started,
    /// Last student confirmed; the session is gone
    Completed(SessionSummary),
}

/// Count entry, rating entry and confirmation.
///
/// The machine owns the only [`Session`]. It renders its own screens and
/// leaves menu handling, key draining and sync to the dispatcher.
#[derive(Debug, Clone)]
pub struct FeedbackMachine {
    phase: Phase,
    timings: Timings,
}

impl FeedbackMachine {
    pub fn new(timings: Timings) -> Self {
        Self {
            phase: Phase::Idle,
            timings,
        }
    }

    pub fn state(&self) -> State {
        match &self.phase {
            Phase::Idle => State::Idle,
            Phase::CountEntry(_) => State::CollectingCount,
            Phase::Collecting(s) if s.pending_rating().is_some() => State::AwaitingConfirm,
            Phase::Collecting(_) => State::AwaitingRating,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Collecting(s) => Some(s),
            _ => None,
        }
    }

    /// Leave `Idle` and ask for the number of students.
    pub fn begin_count_entry<D: Display, P: Pause>(&mut self, panel: &mut Panel<D, P>) {
        debug!("count entry started");
        self.phase = Phase::CountEntry(CountEntry::default());
        panel.show(messages::COUNT_PROMPT.0, messages::COUNT_PROMPT.1);
    }

    /// Show the rating prompt for the student whose turn it is.
    pub fn prompt_student<D: Display, P: Pause>(&self, panel: &mut Panel<D, P>) {
        if let Some(session) = self.session() {
            let (top, bottom) = messages::rate_prompt(session.student_number());
            panel.show(top, &bottom);
        }
    }

    pub fn on_key<D: Display, P: Pause>(&mut self, key: Key, panel: &mut Panel<D, P>) -> Step {
        match self.phase {
            Phase::Idle => Step::Ignored,
            Phase::CountEntry(_) => self.on_count_key(key, panel),
            Phase::Collecting(_) => self.on_rating_key(key, panel),
        }
    }

    fn on_count_key<D: Display, P: Pause>(&mut self, key: Key, panel: &mut Panel<D, P>) -> Step {
        let Phase::CountEntry(entry) = &mut self.phase else {
            return Step::Ignored;
        };

        match key {
            Key::Digit(d) => {
                entry.push_digit(d);
                panel.print_row(1, &messages::count(entry.digits()));
                Step::Updated
            }
            Key::C => {
                debug!("count entry aborted");
                self.phase = Phase::Idle;
                Step::Aborted
            }
            Key::B => match entry.parse() {
                Ok(expected) => {
                    info!(students = expected.get(), "feedback session started");
                    self.phase = Phase::Collecting(Session::new(expected));
                    panel.show(messages::START, "");
                    panel.hold(self.timings.short());
                    Step::Started
                }
                Err(err) => {
                    debug!(%err, digits = entry.digits(), "student count rejected");
                    self.phase = Phase::Idle;
                    panel.show(messages::INVALID_COUNT, "");
                    panel.hold(self.timings.notice());
                    Step::Rejected(err)
                }
            },
            _ => Step::Ignored,
        }
    }

    fn on_rating_key<D: Display, P: Pause>(&mut self, key: Key, panel: &mut Panel<D, P>) -> Step {
        let Phase::Collecting(session) = &mut self.phase else {
            return Step::Ignored;
        };

        match (session.pending_rating(), key) {
            (None, Key::Digit(d)) => {
                // digits outside 1..=5 are dropped without feedback
                if !session.choose(d) {
                    return Step::Ignored;
                }
                debug!(student = session.student_number(), rating = d, "rating pending");
                panel.show(&messages::chose(d), messages::CONFIRM_HINT);
                Step::Updated
            }
            (Some(_), Key::A) => {
                let Some(rating) = session.accept() else {
                    return Step::Ignored;
                };
                debug!(
                    student = session.current_index(),
                    rating,
                    sum = session.rating_sum(),
                    "rating saved"
                );
                panel.show(&messages::saved(rating), "");
                panel.hold(self.timings.short());

                if session.is_complete() {
                    let summary = session.summary();
                    info!(
                        average = summary.average,
                        students = summary.count,
                        "feedback session complete"
                    );
                    self.phase = Phase::Idle;
                    return Step::Completed(summary);
                }

                panel.show(messages::NEXT_STUDENT, "");
                panel.hold(self.timings.short());
                self.prompt_student(panel);
                Step::Updated
            }
            (Some(_), Key::B) => {
                session.cancel();
                debug!(student = session.student_number(), "rating cancelled");
                self.prompt_student(panel);
                Step::Updated
            }
            _ => Step::Ignored,
        }
    }
}
