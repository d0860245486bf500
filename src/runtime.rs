use std::time::Duration;

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Blocking wait used to hold a message on the display.
///
/// The control loop is single threaded, so pausing stalls everything,
/// exactly like a `delay()` on the controller.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Production pause that sleeps the current thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Pause that returns immediately and remembers what was asked of it
#[derive(Clone, Debug, Default)]
pub struct NoPause {
    pub requested: Vec<Duration>,
}

impl NoPause {
    pub fn total(&self) -> Duration {
        self.requested.iter().sum()
    }
}

impl Pause for NoPause {
    fn pause(&mut self, duration: Duration) {
        self.requested.push(duration);
    }
}
