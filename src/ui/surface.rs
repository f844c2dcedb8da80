//! Output sink and input source contracts used by the session.

use std::io;
use std::time::Duration;

use crate::core::event::AuthorColor;

/// How a span should look. The surface decides what that means on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    /// Black on white status banner.
    Banner,
    /// Bold red failure text.
    Error,
    /// Dimmed hints and notices.
    Notice,
    Author(AuthorColor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledLine {
    pub spans: Vec<Span>,
}

impl StyledLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Plain)
    }

    pub fn banner(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Banner)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Error)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Notice)
    }

    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            spans: vec![Span {
                text: text.into(),
                tone,
            }],
        }
    }

    pub fn push(mut self, text: impl Into<String>, tone: Tone) -> Self {
        self.spans.push(Span {
            text: text.into(),
            tone,
        });
        self
    }

    /// The line with all styling dropped.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// A pending question for the user.
///
/// `id` changes every time the controller asks again, even with the same label, so a
/// surface can tell a re-prompt from the prompt it is already editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub id: u64,
    pub label: String,
    pub masked: bool,
    pub completions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPoll {
    /// Nothing submitted within the timeout.
    Idle,
    Line(String),
    /// The user asked to leave (Ctrl-C, Ctrl-D on an empty line, end of input).
    Closed,
}

pub trait Renderer {
    fn clear(&mut self) -> io::Result<()>;
    fn line(&mut self, line: StyledLine) -> io::Result<()>;
    /// Show a block of lines through a pager when it does not fit the screen.
    fn page(&mut self, lines: Vec<String>) -> io::Result<()>;
}

pub trait Surface: Renderer {
    /// Wait up to `timeout` for the answer to `prompt`. With no prompt the surface just idles.
    fn poll_input(&mut self, prompt: Option<&Prompt>, timeout: Duration)
        -> io::Result<InputPoll>;
}
