// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod keypad;
pub mod logging;
pub mod machine;
pub mod messages;
pub mod record;
pub mod runtime;
pub mod session;
pub mod transport;
pub mod ui;

pub use dispatcher::Dispatcher;
pub use error::{ConfigError, CountError, SyncError};
