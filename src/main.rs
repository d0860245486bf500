use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};
use tracing::info;

use feedpad::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, Overrides},
    keypad::{Debouncer, TerminalKeySource},
    logging,
    runtime::{FixedTicker, ThreadPause},
    transport::{HttpTransport, LoopbackTransport, Transport},
    ui::TerminalDisplay,
    Dispatcher,
};

/// keypad-driven classroom feedback collector
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Collects 1-5 ratings from a row of students on a 4x4 keypad, shows progress on a 16x2 display and posts the class average to a remote sheet."
)]
pub struct Cli {
    /// URL the average is posted to and fetched from
    #[clap(short = 'e', long)]
    endpoint: Option<String>,

    /// config file to load instead of the platform default
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// keep averages in memory instead of talking to the endpoint
    #[clap(long)]
    loopback: bool,

    /// association attempts after the first one at start-up
    #[clap(short = 'r', long)]
    retries: Option<u32>,

    /// write the effective configuration back to the config file
    #[clap(long)]
    save_config: bool,

    /// debug-level logging
    #[clap(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            association_retries: self.retries,
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let log_path = AppDirs::log_path().unwrap_or_else(|| PathBuf::from("feedpad.log"));
    logging::init_file_subscriber(&log_path, cli.verbose)?;

    let store = cli.config_store();
    let config = store.load().with_overrides(&cli.overrides());
    if cli.save_config {
        store.save(&config)?;
    }
    info!(endpoint = %config.endpoint, loopback = cli.loopback, "starting");

    if cli.loopback {
        run_controller(LoopbackTransport::online(), &config)
    } else {
        run_controller(HttpTransport::new(&config.endpoint)?, &config)
    }
}

fn run_controller<T: Transport>(transport: T, config: &Config) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    // lets autorepeat and key releases be told apart from presses
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    info!(enhanced, "keyboard enhancement");
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    let keys = TerminalKeySource::new(
        FixedTicker::new(config.tick()),
        Debouncer::new(config.debounce(), config.hold()),
    );
    let mut dispatcher = Dispatcher::new(
        keys,
        TerminalDisplay::new(terminal),
        ThreadPause,
        transport,
        config,
    );
    dispatcher.start_up();
    dispatcher.run();

    let (_, mut display, _, _) = dispatcher.into_parts();
    if enhanced {
        execute!(display.terminal_mut().backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(display.terminal_mut().backend_mut(), LeaveAlternateScreen)?;
    display.terminal_mut().show_cursor()?;

    Ok(())
}
