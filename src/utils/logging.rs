//! Diagnostics setup.
//!
//! The terminal belongs to the prompts and the message stream, so diagnostics only go
//! to a file, and only when `TERCORD_LOG_FILE` names one.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_ENV: &str = "TERCORD_LOG_FILE";
pub const LOG_FILTER_ENV: &str = "TERCORD_LOG";
const DEFAULT_FILTER: &str = "info";

/// Install the file subscriber if `TERCORD_LOG_FILE` is set.
///
/// Returns `Ok(false)` when logging stays off. Failures are for the caller to report;
/// they should not stop the client from starting.
pub fn init_tracing() -> Result<bool, Box<dyn Error>> {
    let Some(path) = std::env::var_os(LOG_FILE_ENV).filter(|p| !p.is_empty()) else {
        return Ok(false);
    };
    let directives = std::env::var(LOG_FILTER_ENV).unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    init_file_tracing(Path::new(&path), &directives)?;
    Ok(true)
}

fn init_file_tracing(path: &Path, directives: &str) -> Result<(), Box<dyn Error>> {
    let filter = build_filter(directives)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}

fn build_filter(directives: &str) -> Result<EnvFilter, Box<dyn Error>> {
    Ok(EnvFilter::builder().parse(directives)?)
}
