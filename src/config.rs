use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;

/// Endpoint the average is posted to and fetched from
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/feedback";
pub const DEFAULT_ASSOCIATION_RETRIES: u32 = 20;
pub const DEFAULT_ASSOCIATION_DELAY_MS: u64 = 500;
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
/// Longer than common terminal autorepeat delays
pub const DEFAULT_HOLD_MS: u64 = 600;
pub const TICK_RATE_MS: u64 = 100;

/// How long each kind of message stays on the display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// "Start feedback", "Saved", "Next student..."
    pub short_ms: u64,
    /// "Invalid number!" and the connection status after start-up
    pub notice_ms: u64,
    /// Averages and sync results
    pub result_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            short_ms: 1000,
            notice_ms: 1500,
            result_ms: 2000,
        }
    }
}

impl Timings {
    pub fn short(&self) -> Duration {
        Duration::from_millis(self.short_ms)
    }

    pub fn notice(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    pub fn result(&self) -> Duration {
        Duration::from_millis(self.result_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub association_retries: u32,
    pub association_delay_ms: u64,
    pub debounce_ms: u64,
    /// Same key again within this long, with no release seen, is a held key
    pub hold_ms: u64,
    pub tick_ms: u64,
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            association_retries: DEFAULT_ASSOCIATION_RETRIES,
            association_delay_ms: DEFAULT_ASSOCIATION_DELAY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            hold_ms: DEFAULT_HOLD_MS,
            tick_ms: TICK_RATE_MS,
            timings: Timings::default(),
        }
    }
}

impl Config {
    pub fn association_delay(&self) -> Duration {
        Duration::from_millis(self.association_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Apply values given on the command line over the stored ones.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(retries) = overrides.association_retries {
            self.association_retries = retries;
        }
        self
    }
}

/// Command line values that take precedence over the config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub association_retries: Option<u32>,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("feedpad_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load(&self) -> Result<Config, ConfigError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice::<Config>(&bytes)?)
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match self.try_load() {
            Ok(cfg) => cfg,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
