//! Selection predicates consulted before the controller accepts navigation input.
//!
//! The controller hands each predicate the candidate set as it stands when the
//! prompt is answered, so a stale index or a vanished channel is rejected the same
//! way as a typo.

use std::error::Error;
use std::fmt;

use crate::core::model::Channel;

/// Rejected navigation input. The message is shown to the user before re-prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ValidationError {}

pub trait SelectionValidator: Send {
    /// Accept `input` as an index into a list of `guild_count` guilds.
    fn guild_index(&self, input: &str, guild_count: usize) -> Result<usize, ValidationError>;

    /// Accept `input` as a `#name` token naming one of `channels`.
    fn channel<'a>(
        &self,
        input: &str,
        channels: &'a [Channel],
    ) -> Result<&'a Channel, ValidationError>;
}

/// Default predicates: decimal indices in range, exact case-sensitive `#name` tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictSelection;

impl SelectionValidator for StrictSelection {
    fn guild_index(&self, input: &str, guild_count: usize) -> Result<usize, ValidationError> {
        let input = input.trim();
        if guild_count == 0 {
            return Err(ValidationError::new("There are no servers to select."));
        }
        if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(format!(
                "Please enter a server number between 0 and {}.",
                guild_count - 1
            )));
        }
        match input.parse::<usize>() {
            Ok(index) if index < guild_count => Ok(index),
            _ => Err(ValidationError::new(format!(
                "Server number out of range. Enter a number between 0 and {}.",
                guild_count - 1
            ))),
        }
    }

    fn channel<'a>(
        &self,
        input: &str,
        channels: &'a [Channel],
    ) -> Result<&'a Channel, ValidationError> {
        let input = input.trim();
        let Some(name) = input.strip_prefix('#') else {
            return Err(ValidationError::new(
                "Channel names start with '#', for example #general.",
            ));
        };
        channels
            .iter()
            .find(|channel| channel.name == name)
            .ok_or_else(|| ValidationError::new(format!("No channel named #{name}.")))
    }
}
