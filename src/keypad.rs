use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEventKind, KeyModifiers};
use tracing::{debug, trace};

use crate::runtime::Ticker;

/// One key of the 4x4 membrane keypad
///
/// ```text
/// 1 2 3 A
/// 4 5 6 B
/// 7 8 9 C
/// * 0 # D
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Digit(u8),
    A,
    B,
    C,
    D,
    Star,
    Hash,
}

impl Key {
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_uppercase() {
            d @ '0'..='9' => Some(Key::Digit(d as u8 - b'0')),
            'A' => Some(Key::A),
            'B' => Some(Key::B),
            'C' => Some(Key::C),
            'D' => Some(Key::D),
            '*' => Some(Key::Star),
            '#' => Some(Key::Hash),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Key::Digit(d) => char::from(b'0' + d),
            Key::A => 'A',
            Key::B => 'B',
            Key::C => 'C',
            Key::D => 'D',
            Key::Star => '*',
            Key::Hash => '#',
        }
    }

}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Producer of discrete, debounced key presses
pub trait KeySource {
    /// Returns at most one key press, or None when nothing arrived this tick.
    fn poll(&mut self) -> Option<Key>;

    /// Throw away presses that are already buffered.
    fn drain(&mut self) {
        while self.poll().is_some() {}
    }

    /// Whether the host asked to stop the control loop
    fn quit_requested(&self) -> bool {
        false
    }
}

/// Collapses a bouncing, held or auto-repeating key into a single press.
///
/// A repeat of the same key is suppressed while it keeps arriving within
/// `hold` of its previous sighting, which covers the terminal's autorepeat
/// delay. Once a release has been reported only the short `bounce` window
/// applies, so a deliberate second press passes.
#[derive(Debug, Clone)]
pub struct Debouncer {
    bounce: Duration,
    hold: Duration,
    last: Option<Seen>,
}

#[derive(Debug, Clone, Copy)]
struct Seen {
    key: Key,
    at: Instant,
    released: bool,
}

impl Debouncer {
    pub fn new(bounce: Duration, hold: Duration) -> Self {
        Self {
            bounce,
            hold: hold.max(bounce),
            last: None,
        }
    }

    pub fn accept(&mut self, key: Key, now: Instant) -> bool {
        let suppressed = match self.last {
            Some(seen) if seen.key == key => {
                let window = if seen.released { self.bounce } else { self.hold };
                now.duration_since(seen.at) < window
            }
            _ => false,
        };
        self.last = Some(Seen {
            key,
            at: now,
            released: false,
        });
        !suppressed
    }

    /// The key went up; the bounce window now runs from `now`.
    pub fn release(&mut self, key: Key, now: Instant) {
        if let Some(seen) = self.last.as_mut().filter(|seen| seen.key == key) {
            seen.at = now;
            seen.released = true;
        }
    }
}

enum TerminalInput {
    Key(Key),
    Release(Key),
    Quit,
}

fn keypad_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(c) => Key::from_char(c),
        KeyCode::Enter => Some(Key::B),
        _ => None,
    }
}

/// Keypad emulated on the host keyboard through crossterm
pub struct TerminalKeySource<T: Ticker> {
    rx: Receiver<TerminalInput>,
    ticker: T,
    debouncer: Debouncer,
    quit: bool,
}

impl<T: Ticker> TerminalKeySource<T> {
    /// Releases are only reported once keyboard enhancement is pushed;
    /// without them the debouncer's hold window does the work alone.
    pub fn new(ticker: T, debouncer: Debouncer) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let input = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Esc => Some(TerminalInput::Quit),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        Some(TerminalInput::Quit)
                    }
                    code => keypad_key(code).map(TerminalInput::Key),
                },
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Release => {
                    keypad_key(key.code).map(TerminalInput::Release)
                }
                Ok(_) => None,
                Err(_) => break,
            };

            if let Some(input) = input {
                if tx.send(input).is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            ticker,
            debouncer,
            quit: false,
        }
    }

    fn accept(&mut self, input: TerminalInput) -> Option<Key> {
        match input {
            TerminalInput::Quit => {
                debug!("quit requested from terminal");
                self.quit = true;
                None
            }
            TerminalInput::Release(key) => {
                self.debouncer.release(key, Instant::now());
                None
            }
            TerminalInput::Key(key) => {
                if self.debouncer.accept(key, Instant::now()) {
                    Some(key)
                } else {
                    trace!(%key, "debounced");
                    None
                }
            }
        }
    }
}

impl<T: Ticker> KeySource for TerminalKeySource<T> {
    fn poll(&mut self) -> Option<Key> {
        match self.rx.recv_timeout(self.ticker.interval()) {
            Ok(input) => self.accept(input),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.quit = true;
                None
            }
        }
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(TerminalInput::Quit) => self.quit = true,
                Ok(TerminalInput::Key(key)) => {
                    // still seen, so a held key does not fire again afterwards
                    self.debouncer.accept(key, Instant::now());
                    trace!(%key, "drained");
                }
                Ok(TerminalInput::Release(key)) => self.debouncer.release(key, Instant::now()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.quit = true;
                    break;
                }
            }
        }
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }
}

/// Key source for headless runs and tests.
///
/// Scripted presses arrive one per poll. A press may carry strays: extra
/// presses that land in the scanner buffer right after it, the way a bouncy
/// contact does. Buffered strays are served first and are the only thing
/// `drain` discards.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    script: VecDeque<(Key, Vec<Key>)>,
    buffered: VecDeque<Key>,
}

impl ScriptedKeys {
    pub fn new<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        Self {
            script: keys.into_iter().map(|k| (k, Vec::new())).collect(),
            buffered: VecDeque::new(),
        }
    }

    /// Build a script from keypad characters, skipping anything that is not a key.
    pub fn typed(keys: &str) -> Self {
        Self::new(keys.chars().filter_map(Key::from_char))
    }

    pub fn push(&mut self, key: Key) {
        self.script.push_back((key, Vec::new()));
    }

    /// Script a press followed by stray presses left in the buffer
    pub fn push_bouncy(&mut self, key: Key, strays: &[Key]) {
        self.script.push_back((key, strays.to_vec()));
    }

    pub fn remaining(&self) -> usize {
        self.script.len() + self.buffered.len()
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Option<Key> {
        if let Some(key) = self.buffered.pop_front() {
            return Some(key);
        }
        let (key, strays) = self.script.pop_front()?;
        self.buffered.extend(strays);
        Some(key)
    }

    fn drain(&mut self) {
        self.buffered.clear();
    }

    fn quit_requested(&self) -> bool {
        self.remaining() == 0
    }
}
