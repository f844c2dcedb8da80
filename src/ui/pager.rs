//! Long listings go through the user's pager.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::debug;

const DEFAULT_PAGER: &str = "less -R";

/// Whether `line_count` lines need a pager on a screen `rows` tall.
///
/// One row stays free for the prompt that follows the listing.
pub fn needs_pager(line_count: usize, is_terminal: bool, rows: Option<u16>) -> bool {
    match rows {
        Some(rows) if is_terminal => line_count >= usize::from(rows.max(1)),
        _ => false,
    }
}

/// Program and arguments from `$PAGER`, or `less -R` when it is unset or blank.
pub fn pager_command(pager_env: Option<&str>) -> (String, Vec<String>) {
    let command = pager_env
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_PAGER);
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| "less".to_string());
    (program, parts.collect())
}

/// Pipe `lines` into the pager and wait for the user to leave it.
///
/// The terminal must already be in cooked mode.
pub fn run_pager(lines: &[String]) -> io::Result<()> {
    let (program, args) = pager_command(std::env::var("PAGER").ok().as_deref());
    debug!(%program, "Opening pager");
    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        for line in lines {
            // The pager may quit before reading everything.
            if writeln!(stdin, "{line}").is_err() {
                break;
            }
        }
    }
    let status = child.wait()?;
    if !status.success() {
        debug!(%status, "Pager exited with non-zero status");
    }
    Ok(())
}
