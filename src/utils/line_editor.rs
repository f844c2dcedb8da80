//! Single-line terminal editor for the session prompts.
//!
//! The editor is driven one terminal event at a time so the caller can interleave
//! output with an unfinished line and redraw it afterwards.

use crate::utils::input::sanitize_text_input;
use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineEditorState {
    pub text: String,
    pub cursor: usize,
    /// Seed text and index while Tab is cycling through candidates.
    completion: Option<(String, usize)>,
}

impl LineEditorState {
    pub fn with_text(text: String) -> Self {
        let cursor = text.chars().count();
        Self {
            text,
            cursor,
            completion: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    #[default]
    None,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineEditorOptions {
    pub mask_mode: MaskMode,
    /// Candidates offered by Tab.
    pub completions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEditAction {
    Insert(char),
    Backspace,
    Delete,
    MoveLeft,
    MoveRight,
    MoveStart,
    MoveEnd,
    DeleteToEnd,
    DeleteWord,
    ClearAll,
    Complete,
    Paste(String),
    Submit,
    /// Ctrl-D: closes on an empty line, deletes forward otherwise.
    EndOfInput,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEditOutcome {
    Continue { redraw: bool },
    Submit(String),
    Closed,
}

/// Feed one terminal event to the editor. Events that mean nothing to it are ignored.
pub fn apply_terminal_event(
    state: &mut LineEditorState,
    event: Event,
    options: &LineEditorOptions,
) -> LineEditOutcome {
    let action = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => map_key_event_to_action(&key),
        Event::Paste(text) => Some(LineEditAction::Paste(sanitize_text_input(&text))),
        _ => None,
    };
    match action {
        Some(action) => apply_line_edit_action(state, action, options),
        None => LineEditOutcome::Continue { redraw: false },
    }
}

/// Rewrite the current row as `prompt` followed by the (possibly masked) text.
pub fn render_line<W: Write>(
    out: &mut W,
    prompt: &str,
    state: &LineEditorState,
    options: &LineEditorOptions,
) -> io::Result<()> {
    let display_text = display_text(state, options);
    let prefix = display_prefix_up_to_cursor(state, options);
    let cursor_columns =
        UnicodeWidthStr::width(prompt) + UnicodeWidthStr::width(prefix.as_str());

    write!(out, "\r\x1b[K{}{}", prompt, display_text)?;
    if cursor_columns > 0 {
        write!(out, "\r\x1b[{}C", cursor_columns)?;
    } else {
        write!(out, "\r")?;
    }
    out.flush()
}

fn display_text(state: &LineEditorState, options: &LineEditorOptions) -> String {
    match options.mask_mode {
        MaskMode::None => state.text.clone(),
        MaskMode::Hidden => "*".repeat(state.text.chars().count()),
    }
}

fn display_prefix_up_to_cursor(state: &LineEditorState, options: &LineEditorOptions) -> String {
    let display = display_text(state, options);
    display.chars().take(state.cursor).collect()
}

pub fn map_key_event_to_action(key: &KeyEvent) -> Option<LineEditAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => Some(LineEditAction::Submit),
        KeyCode::Tab => Some(LineEditAction::Complete),
        KeyCode::Backspace => Some(LineEditAction::Backspace),
        KeyCode::Delete => Some(LineEditAction::Delete),
        KeyCode::Left => Some(LineEditAction::MoveLeft),
        KeyCode::Right => Some(LineEditAction::MoveRight),
        KeyCode::Home => Some(LineEditAction::MoveStart),
        KeyCode::End => Some(LineEditAction::MoveEnd),
        KeyCode::Char('a') if ctrl => Some(LineEditAction::MoveStart),
        KeyCode::Char('e') if ctrl => Some(LineEditAction::MoveEnd),
        KeyCode::Char('k') if ctrl => Some(LineEditAction::DeleteToEnd),
        KeyCode::Char('w') if ctrl => Some(LineEditAction::DeleteWord),
        KeyCode::Char('u') if ctrl => Some(LineEditAction::ClearAll),
        KeyCode::Char('d') if ctrl => Some(LineEditAction::EndOfInput),
        KeyCode::Char('c') if ctrl => Some(LineEditAction::Cancel),
        KeyCode::Char(c) if !ctrl => {
            if c == '\n' || c == '\r' {
                Some(LineEditAction::Submit)
            } else {
                Some(LineEditAction::Insert(c))
            }
        }
        _ => None,
    }
}

pub fn apply_line_edit_action(
    state: &mut LineEditorState,
    action: LineEditAction,
    options: &LineEditorOptions,
) -> LineEditOutcome {
    if action != LineEditAction::Complete {
        state.completion = None;
    }
    match action {
        LineEditAction::Insert(c) => {
            insert_char_at_cursor(&mut state.text, state.cursor, c);
            state.cursor += 1;
            LineEditOutcome::Continue { redraw: true }
        }
        LineEditAction::Backspace => {
            if remove_char_before_cursor(&mut state.text, state.cursor) {
                state.cursor -= 1;
                LineEditOutcome::Continue { redraw: true }
            } else {
                LineEditOutcome::Continue { redraw: false }
            }
        }
        LineEditAction::Delete => LineEditOutcome::Continue {
            redraw: remove_char_at_cursor(&mut state.text, state.cursor),
        },
        LineEditAction::MoveLeft => {
            if state.cursor > 0 {
                state.cursor -= 1;
                LineEditOutcome::Continue { redraw: true }
            } else {
                LineEditOutcome::Continue { redraw: false }
            }
        }
        LineEditAction::MoveRight => {
            let len = state.text.chars().count();
            if state.cursor < len {
                state.cursor += 1;
                LineEditOutcome::Continue { redraw: true }
            } else {
                LineEditOutcome::Continue { redraw: false }
            }
        }
        LineEditAction::MoveStart => {
            let moved = state.cursor != 0;
            state.cursor = 0;
            LineEditOutcome::Continue { redraw: moved }
        }
        LineEditAction::MoveEnd => {
            let end = state.text.chars().count();
            let moved = state.cursor != end;
            state.cursor = end;
            LineEditOutcome::Continue { redraw: moved }
        }
        LineEditAction::DeleteToEnd => {
            let byte_idx = char_to_byte_index(&state.text, state.cursor);
            if byte_idx >= state.text.len() {
                LineEditOutcome::Continue { redraw: false }
            } else {
                state.text.truncate(byte_idx);
                LineEditOutcome::Continue { redraw: true }
            }
        }
        LineEditAction::DeleteWord => {
            if state.cursor == 0 {
                LineEditOutcome::Continue { redraw: false }
            } else {
                state.cursor = delete_word_before_cursor(&mut state.text, state.cursor);
                LineEditOutcome::Continue { redraw: true }
            }
        }
        LineEditAction::ClearAll => {
            if state.text.is_empty() {
                LineEditOutcome::Continue { redraw: false }
            } else {
                state.text.clear();
                state.cursor = 0;
                LineEditOutcome::Continue { redraw: true }
            }
        }
        LineEditAction::Complete => complete(state, options),
        LineEditAction::Paste(text) => {
            let before_newline = text.split('\n').next().unwrap_or("");
            if !before_newline.is_empty() {
                insert_str_at_cursor(&mut state.text, state.cursor, before_newline);
                state.cursor += before_newline.chars().count();
            }
            if text.contains('\n') {
                LineEditOutcome::Submit(state.text.clone())
            } else {
                LineEditOutcome::Continue {
                    redraw: !before_newline.is_empty(),
                }
            }
        }
        LineEditAction::Submit => LineEditOutcome::Submit(state.text.clone()),
        LineEditAction::EndOfInput => {
            if state.text.is_empty() {
                LineEditOutcome::Closed
            } else {
                LineEditOutcome::Continue {
                    redraw: remove_char_at_cursor(&mut state.text, state.cursor),
                }
            }
        }
        LineEditAction::Cancel => LineEditOutcome::Closed,
    }
}

/// First Tab extends to the longest shared prefix; once nothing is left to extend,
/// further presses cycle through the matching candidates.
fn complete(state: &mut LineEditorState, options: &LineEditorOptions) -> LineEditOutcome {
    if options.mask_mode == MaskMode::Hidden {
        return LineEditOutcome::Continue { redraw: false };
    }
    let seed = match state.completion.as_ref() {
        Some((seed, _)) => seed.clone(),
        None => state.text.clone(),
    };
    let matches: Vec<&String> = options
        .completions
        .iter()
        .filter(|candidate| candidate.starts_with(seed.as_str()))
        .collect();
    if matches.is_empty() {
        return LineEditOutcome::Continue { redraw: false };
    }

    let replacement = match state.completion.take() {
        Some((seed, index)) => {
            let next = (index + 1) % matches.len();
            state.completion = Some((seed, next));
            matches[next].clone()
        }
        None => {
            let common = longest_common_prefix(&matches);
            if common.len() > state.text.len() {
                common
            } else {
                state.completion = Some((seed, 0));
                matches[0].clone()
            }
        }
    };

    let changed = replacement != state.text;
    state.cursor = replacement.chars().count();
    state.text = replacement;
    LineEditOutcome::Continue { redraw: changed }
}

fn longest_common_prefix(candidates: &[&String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix_len = first.len();
    for candidate in &candidates[1..] {
        prefix_len = first
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((idx, c), _)| idx + c.len_utf8())
            .unwrap_or(0)
            .min(prefix_len);
    }
    first[..prefix_len].to_string()
}

fn insert_char_at_cursor(input: &mut String, cursor: usize, c: char) {
    let byte_idx = char_to_byte_index(input, cursor);
    input.insert(byte_idx, c);
}

fn insert_str_at_cursor(input: &mut String, cursor: usize, text: &str) {
    let byte_idx = char_to_byte_index(input, cursor);
    input.insert_str(byte_idx, text);
}

fn remove_char_before_cursor(input: &mut String, cursor: usize) -> bool {
    if cursor == 0 {
        return false;
    }
    let end = char_to_byte_index(input, cursor);
    let start = char_to_byte_index(input, cursor - 1);
    input.replace_range(start..end, "");
    true
}

fn remove_char_at_cursor(input: &mut String, cursor: usize) -> bool {
    let start = char_to_byte_index(input, cursor);
    if start >= input.len() {
        return false;
    }
    let end = char_to_byte_index(input, cursor + 1);
    input.replace_range(start..end, "");
    true
}

fn delete_word_before_cursor(input: &mut String, cursor: usize) -> usize {
    let mut chars: Vec<char> = input.chars().collect();
    let mut idx = cursor.min(chars.len());
    while idx > 0 && chars[idx - 1] == ' ' {
        idx -= 1;
    }
    while idx > 0 && chars[idx - 1] != ' ' {
        idx -= 1;
    }
    chars.drain(idx..cursor.min(chars.len()));
    *input = chars.into_iter().collect();
    idx
}

fn char_to_byte_index(input: &str, char_index: usize) -> usize {
    input
        .char_indices()
        .nth(char_index)
        .map(|(idx, _)| idx)
        .unwrap_or(input.len())
}
