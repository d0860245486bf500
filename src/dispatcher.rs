use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Config, Timings};
use crate::display::{Display, Panel};
use crate::error::SyncError;
use crate::keypad::{Key, KeySource};
use crate::machine::{FeedbackMachine, State, Step};
use crate::messages;
use crate::record::FeedbackRecord;
use crate::runtime::Pause;
use crate::session::{LastResult, Session, SessionSummary};
use crate::transport::Transport;

/// Top-level control loop of the controller.
///
/// Polls the keypad once per step. While a session is active every key goes
/// to the [`FeedbackMachine`]; otherwise `1` starts a session, `2` shows the
/// last local average and `3` fetches the remote one.
pub struct Dispatcher<K: KeySource, D: Display, P: Pause, T: Transport> {
    keys: K,
    panel: Panel<D, P>,
    transport: T,
    machine: FeedbackMachine,
    last: LastResult,
    timings: Timings,
    association_retries: u32,
    association_delay: Duration,
}

impl<K: KeySource, D: Display, P: Pause, T: Transport> Dispatcher<K, D, P, T> {
    pub fn new(keys: K, display: D, pause: P, transport: T, config: &Config) -> Self {
        Self {
            keys,
            panel: Panel::new(display, pause),
            transport,
            machine: FeedbackMachine::new(config.timings),
            last: LastResult::default(),
            timings: config.timings,
            association_retries: config.association_retries,
            association_delay: config.association_delay(),
        }
    }

    /// Bring the link up with a bounded number of attempts, report the
    /// outcome, then show the menu. Returns whether the link is up.
    pub fn start_up(&mut self) -> bool {
        self.panel.show(messages::CONNECTING, "");

        let mut connected = self.transport.associate();
        let mut attempts = 0;
        while !connected && attempts < self.association_retries {
            self.panel.hold(self.association_delay);
            self.panel.append(".");
            attempts += 1;
            connected = self.transport.associate();
        }

        if connected {
            info!(attempts, "network associated");
            self.panel.show(messages::CONNECTED, "");
        } else {
            warn!(attempts, "network association failed");
            self.panel.show(messages::CONNECT_FAILED, "");
        }
        self.panel.set_status_led(connected);
        self.panel.hold(self.timings.notice());
        self.render_menu();
        self.discard_held_presses();
        connected
    }

    /// Run until the key source asks to stop.
    pub fn run(&mut self) {
        while !self.keys.quit_requested() {
            self.step();
        }
        debug!(state = %self.machine.state(), "control loop stopped");
    }

    /// Poll once and dispatch at most one key. Returns whether a key arrived.
    pub fn step(&mut self) -> bool {
        match self.keys.poll() {
            Some(key) => {
                self.dispatch(key);
                true
            }
            None => false,
        }
    }

    pub fn dispatch(&mut self, key: Key) {
        debug!(%key, state = %self.machine.state(), "key");
        if self.machine.is_active() {
            let step = self.machine.on_key(key, &mut self.panel);
            self.follow_up(step);
        } else {
            match key {
                Key::Digit(1) => self.machine.begin_count_entry(&mut self.panel),
                Key::Digit(2) => self.show_average(),
                Key::Digit(3) => self.show_remote_average(),
                _ => {}
            }
        }
        // the keypad is not scanned while a message is held
        self.discard_held_presses();
    }

    fn discard_held_presses(&mut self) {
        if self.panel.take_held() {
            self.keys.drain();
        }
    }

    fn follow_up(&mut self, step: Step) {
        match step {
            Step::Ignored | Step::Updated => {}
            Step::Aborted | Step::Rejected(_) => self.render_menu(),
            Step::Started => self.machine.prompt_student(&mut self.panel),
            Step::Completed(summary) => self.complete_session(summary),
        }
    }

    fn complete_session(&mut self, summary: SessionSummary) {
        self.last = LastResult::from(summary);
        self.report_sync(summary);
        self.show_average();
    }

    /// Link state at call time, with one association attempt when it is down.
    fn link_up(&mut self) -> bool {
        let up = self.transport.is_connected() || self.transport.associate();
        self.panel.set_status_led(up);
        up
    }

    /// Post the completed session's average.
    pub fn sync(&mut self, summary: SessionSummary) -> Result<(), SyncError> {
        if !self.link_up() {
            return Err(SyncError::NetworkUnavailable);
        }
        self.transport.send(&FeedbackRecord::from(summary))
    }

    /// Best-effort sync: the outcome is shown and logged, the result stands.
    fn report_sync(&mut self, summary: SessionSummary) {
        match self.sync(summary) {
            Ok(()) => {
                info!(average = summary.average, students = summary.count, "average sent");
                self.panel.show(messages::SENT, "");
            }
            Err(SyncError::NetworkUnavailable) => {
                warn!("not associated, average not sent");
                self.panel.show(messages::NETWORK_ERROR, "");
            }
            Err(err) => {
                warn!(%err, "sending average failed");
                self.panel.show(messages::SEND_FAILED, "");
            }
        }
        self.panel.hold(self.timings.result());
    }

    pub fn show_average(&mut self) {
        self.panel.show(&messages::average(self.last.average), "");
        self.panel.hold(self.timings.result());
        self.render_menu();
    }

    /// Read the remote average; `LastResult` is untouched.
    pub fn fetch_average(&mut self) -> Result<f64, SyncError> {
        if !self.link_up() {
            return Err(SyncError::NetworkUnavailable);
        }
        self.transport.fetch().map(|remote| remote.average)
    }

    fn show_remote_average(&mut self) {
        match self.fetch_average() {
            Ok(average) => {
                info!(average, "remote average fetched");
                self.panel.show(messages::FETCHED, &messages::fetched(average));
            }
            Err(SyncError::NetworkUnavailable) => {
                warn!("not associated, fetch skipped");
                self.panel.show(messages::NETWORK_ERROR, "");
            }
            Err(err) => {
                warn!(%err, "fetching average failed");
                self.panel.show(messages::FETCH_FAILED, "");
            }
        }
        self.panel.hold(self.timings.result());
        self.render_menu();
    }

    pub fn render_menu(&mut self) {
        self.panel.show(messages::MENU.0, messages::MENU.1);
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.machine.session()
    }

    pub fn last_result(&self) -> LastResult {
        self.last
    }

    pub fn display(&self) -> &D {
        self.panel.display()
    }

    pub fn pause(&self) -> &P {
        self.panel.pause()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (K, D, P, T) {
        let (display, pause) = self.panel.into_parts();
        (self.keys, display, pause, self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LcdBuffer;
    use crate::keypad::ScriptedKeys;
    use crate::runtime::NoPause;
    use crate::transport::LoopbackTransport;
    use assert_matches::assert_matches;

    type TestDispatcher = Dispatcher<ScriptedKeys, LcdBuffer, NoPause, LoopbackTransport>;

    fn dispatcher(keys: &str, transport: LoopbackTransport) -> TestDispatcher {
        Dispatcher::new(
            ScriptedKeys::typed(keys),
            LcdBuffer::new(),
            NoPause::default(),
            transport,
            &Config::default(),
        )
    }

    fn rows(d: &TestDispatcher) -> [String; 2] {
        d.display().rows()
    }

    fn menu() -> [String; 2] {
        [messages::MENU.0.to_string(), messages::MENU.1.to_string()]
    }

    #[test]
    fn start_up_connected_lights_led() {
        let mut d = dispatcher("", LoopbackTransport::online());
        assert!(d.start_up());
        assert!(d.display().status_led());
        assert_eq!(rows(&d), menu());
        assert_eq!(d.pause().requested, vec![Timings::default().notice()]);
    }

    #[test]
    fn start_up_retries_are_bounded() {
        let mut d = dispatcher("", LoopbackTransport::offline());
        assert!(!d.start_up());
        assert!(!d.display().status_led());
        // first attempt plus the configured retries
        assert_eq!(d.transport().attempts(), 21);
        assert_eq!(
            d.pause().total(),
            Duration::from_millis(20 * 500) + Timings::default().notice()
        );
    }

    #[test]
    fn start_up_succeeds_after_retries() {
        let mut d = dispatcher("", LoopbackTransport::offline().reachable_after(3));
        assert!(d.start_up());
        assert_eq!(d.transport().attempts(), 3);
        let delay = Duration::from_millis(500);
        assert_eq!(
            d.pause().requested,
            vec![delay, delay, Timings::default().notice()]
        );
    }

    #[test]
    fn menu_ignores_unknown_keys() {
        let mut d = dispatcher("4ABCD*#0", LoopbackTransport::online());
        d.render_menu();
        d.run();
        assert_eq!(d.state(), State::Idle);
        assert_eq!(rows(&d), menu());
        assert!(d.pause().requested.is_empty());
    }

    #[test]
    fn show_average_before_any_session() {
        let mut d = dispatcher("2", LoopbackTransport::online());
        d.step();
        assert_eq!(d.pause().requested, vec![Timings::default().result()]);
        assert_eq!(rows(&d), menu());
        assert!(!d.last_result().is_set());
    }

    #[test]
    fn single_student_session_syncs_once() {
        let mut d = dispatcher("11B3A", LoopbackTransport::online());
        d.start_up();
        d.run();
        assert_eq!(d.state(), State::Idle);
        assert!(d.session().is_none());
        assert_eq!(
            d.last_result(),
            LastResult {
                average: 3.0,
                count: 1
            }
        );
        assert_eq!(
            d.transport().sent(),
            &[FeedbackRecord {
                average: 3.0,
                num_students: 1
            }]
        );
        assert_eq!(rows(&d), menu());
    }

    #[test]
    fn sync_without_link_still_records_result() {
        let mut d = dispatcher("11B5A", LoopbackTransport::offline());
        d.start_up();
        d.run();
        assert_eq!(d.last_result().average, 5.0);
        assert!(d.transport().sent().is_empty());
    }

    #[test]
    fn sync_reports_each_outcome() {
        let summary = SessionSummary {
            average: 2.5,
            count: 2,
        };

        let mut d = dispatcher("", LoopbackTransport::online());
        d.start_up();
        assert_eq!(d.sync(summary), Ok(()));
        d.report_sync(summary);
        assert_eq!(d.display().row(0), "Sent to Sheet!");

        let mut d = dispatcher("", LoopbackTransport::online().failing());
        d.start_up();
        assert_matches!(d.sync(summary), Err(SyncError::TransportFailure(_)));
        d.report_sync(summary);
        assert_eq!(d.display().row(0), "Send Failed!");

        let mut d = dispatcher("", LoopbackTransport::offline());
        assert_eq!(d.sync(summary), Err(SyncError::NetworkUnavailable));
        d.report_sync(summary);
        assert_eq!(d.display().row(0), "WiFi Error");
        assert!(d.transport().sent().is_empty());
    }

    #[test]
    fn link_is_rechecked_when_syncing() {
        let mut d = dispatcher("11B4A3", LoopbackTransport::offline());
        assert!(!d.start_up());
        assert!(!d.display().status_led());

        // access point comes back after a failed boot
        d.transport_mut().restore();
        d.run();
        assert_eq!(
            d.transport().sent(),
            &[FeedbackRecord {
                average: 4.0,
                num_students: 1
            }]
        );
        assert_eq!(d.transport().fetches(), 1);
        assert!(d.display().status_led());
    }

    #[test]
    fn lost_link_mid_session_is_network_error() {
        let mut d = dispatcher("11B", LoopbackTransport::online());
        assert!(d.start_up());
        d.run();
        assert_eq!(d.state(), State::AwaitingRating);

        d.transport_mut().disconnect();
        d.dispatch(Key::Digit(4));
        d.dispatch(Key::A);
        assert!(d.transport().sent().is_empty());
        assert_eq!(d.last_result().average, 4.0);
        assert!(!d.display().status_led());

        d.report_sync(SessionSummary {
            average: 4.0,
            count: 1,
        });
        assert_eq!(d.display().row(0), "WiFi Error");
        assert_eq!(d.fetch_average(), Err(SyncError::NetworkUnavailable));
        assert_eq!(d.transport().fetches(), 0);
    }

    #[test]
    fn presses_during_a_held_message_are_dropped() {
        let mut keys = ScriptedKeys::typed("12B3");
        // 5 lands while "Next student..." is on screen
        keys.push_bouncy(Key::A, &[Key::Digit(5)]);
        keys.push(Key::Digit(2));
        keys.push(Key::A);
        let mut d = Dispatcher::new(
            keys,
            LcdBuffer::new(),
            NoPause::default(),
            LoopbackTransport::online(),
            &Config::default(),
        );
        d.start_up();
        d.run();
        assert_eq!(d.last_result().average, 2.5);
    }

    #[test]
    fn presses_during_average_display_are_dropped() {
        let mut keys = ScriptedKeys::default();
        keys.push_bouncy(Key::Digit(2), &[Key::Digit(1)]);
        let mut d = Dispatcher::new(
            keys,
            LcdBuffer::new(),
            NoPause::default(),
            LoopbackTransport::online(),
            &Config::default(),
        );
        d.run();
        assert_eq!(d.state(), State::Idle);
        assert_eq!(rows(&d), menu());
    }

    #[test]
    fn fetch_offline_short_circuits() {
        let mut d = dispatcher("", LoopbackTransport::offline().with_body(br#"{"average":1}"#));
        assert_eq!(d.fetch_average(), Err(SyncError::NetworkUnavailable));
        assert_eq!(d.transport().fetches(), 0);
    }

    #[test]
    fn fetch_shows_remote_value_without_touching_last_result() {
        let mut d = dispatcher("", LoopbackTransport::online().with_body(br#"{"average": 4.25}"#));
        d.start_up();
        assert_eq!(d.fetch_average(), Ok(4.25));
        d.show_remote_average();
        assert_eq!(d.last_result(), LastResult::default());
        assert_eq!(d.transport().fetches(), 2);
        assert_eq!(d.pause().requested.last(), Some(&Timings::default().result()));
        assert_eq!(rows(&d), menu());
    }

    #[test]
    fn fetch_malformed_payload_fails() {
        let mut d = dispatcher("", LoopbackTransport::online().with_body(br#"{"mean": 4.25}"#));
        d.start_up();
        assert_matches!(d.fetch_average(), Err(SyncError::MalformedResponse(_)));
    }

    #[test]
    fn invalid_count_returns_to_menu() {
        let mut d = dispatcher("10B", LoopbackTransport::online());
        d.run();
        assert_eq!(d.state(), State::Idle);
        assert!(d.session().is_none());
        assert_eq!(rows(&d), menu());
    }

    #[test]
    fn abort_count_entry_returns_to_menu() {
        let mut d = dispatcher("15C", LoopbackTransport::online());
        d.run();
        assert_eq!(d.state(), State::Idle);
        assert_eq!(rows(&d), menu());
    }
}
