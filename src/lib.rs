//! tercord is a terminal client for guild-based chat services.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session state machine, the typed event hub, selection
//!   validation and the persisted config.
//! - [`transport`] talks to the chat service and publishes what it learns on the hub.
//! - [`ui`] renders to the terminal, reads prompts, and runs the loop that drives the
//!   controller from both input and transport events.
//! - [`utils`] holds the line editor, color quantization, logging setup and small helpers.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod transport;
pub mod ui;
pub mod utils;
