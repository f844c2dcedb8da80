//! Command-line parsing and process setup.
//!
//! `cli::main` owns the runtime, the config file and the terminal for the duration of
//! one session and hands everything to [`crate::ui::driver::SessionDriver`].


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::controller::SessionController;
use crate::core::hub::EventHub;
use crate::core::validation::StrictSelection;
use crate::transport::rest::RestTransport;
use crate::transport::Transport;
use crate::ui::driver::{ConfigStore, SessionDriver};
use crate::ui::terminal::TerminalSurface;
use crate::utils::logging::init_tracing;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "tercord")]
#[command(version = VERSION)]
#[command(about = "Read guild chat channels from the terminal")]
#[command(
    long_about = "tercord logs in to a guild-based chat service, lets you pick a guild and a \
text channel, and streams the channel's messages into the terminal.\n\n\
Navigation:\n\
  <number>          Pick a guild from the list\n\
  #<name>           Open a text channel (Tab completes)\n\
  /channels         Back to the channel list\n\
  /guilds           Reload the guild list\n\
  /help             Show these commands\n\
  /quit             Leave (Ctrl-C and Ctrl-D work too)\n\n\
Environment Variables:\n\
  TERCORD_LOG_FILE  Write diagnostics to this file\n\
  TERCORD_LOG       Log filter directives (default: info)\n\
  TERCORD_COLOR     Force color depth: truecolor, 256 or 16\n\
  PAGER             Pager for long listings (default: less -R)"
)]
pub struct Args {
    /// Config file to use instead of the one in the platform config directory
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn config_path(&self) -> Result<PathBuf, Box<dyn Error>> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::default_path()?),
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match init_tracing() {
        Ok(true) => debug!("File logging enabled"),
        Ok(false) => {}
        Err(err) => eprintln!("⚠️  Logging disabled: {err}"),
    }

    let config_path = args.config_path()?;
    let config = Config::load_from_path(&config_path)?;
    info!(path = %config_path.display(), "Loaded config");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let hub = EventHub::new();
    let transport: Arc<dyn Transport> =
        Arc::new(RestTransport::new(Arc::clone(&hub), &config.connection)?);
    let controller = SessionController::new(config.session(), Box::new(StrictSelection));

    let result = {
        let surface = TerminalSurface::new()?;
        let mut driver = SessionDriver::new(
            controller,
            surface,
            Arc::clone(&transport),
            &hub,
            runtime.handle().clone(),
            ConfigStore::new(config, config_path),
        );
        // The surface restores the terminal when the driver is dropped here.
        driver.run()
    };

    transport.shutdown();
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    result.map_err(Into::into)
}
