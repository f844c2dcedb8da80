//! The interactive [`Surface`]: raw-mode prompt editing with output interleaved above it.
//!
//! While a prompt is being edited and a line has to be shown, the prompt row is erased,
//! the line is printed, and the prompt is drawn again with whatever was typed so far.
//! When stdin is not a terminal, prompts are answered from a line reader thread instead.

use std::io::{self, BufRead, IsTerminal, Stdout, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use ratatui::crossterm::{
    cursor::MoveTo,
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use tracing::{debug, warn};

use crate::ui::pager::{needs_pager, run_pager};
use crate::ui::surface::{InputPoll, Prompt, Renderer, Span, StyledLine, Surface, Tone};
use crate::utils::color::{author_color, detect_color_depth, ColorDepth};
use crate::utils::line_editor::{
    apply_terminal_event, map_key_event_to_action, render_line, LineEditAction, LineEditOutcome,
    LineEditorOptions, LineEditorState, MaskMode,
};

pub enum InputSource {
    /// Key events from the raw-mode terminal.
    Keys,
    /// Whole lines from a reader thread; a closed channel means end of input.
    Lines(Receiver<String>),
}

struct Editing {
    prompt_id: u64,
    label: String,
    options: LineEditorOptions,
    state: LineEditorState,
    drawn: bool,
}

impl Editing {
    fn new(prompt: &Prompt) -> Self {
        Self {
            prompt_id: prompt.id,
            label: prompt.label.clone(),
            options: LineEditorOptions {
                mask_mode: if prompt.masked {
                    MaskMode::Hidden
                } else {
                    MaskMode::None
                },
                completions: prompt.completions.clone(),
            },
            state: LineEditorState::default(),
            drawn: false,
        }
    }
}

pub struct TerminalSurface<W: Write = Stdout> {
    out: W,
    input: InputSource,
    /// Raw mode is on: line ends need `\r\n` and the prompt row can be rewritten.
    raw: bool,
    styled: bool,
    depth: ColorDepth,
    editing: Option<Editing>,
}

impl TerminalSurface<Stdout> {
    /// Take over the terminal, or fall back to reading lines when stdin is piped.
    pub fn new() -> io::Result<Self> {
        let mut out = io::stdout();
        let stdout_tty = out.is_terminal();
        let depth = detect_color_depth();

        if io::stdin().is_terminal() && stdout_tty {
            enable_raw_mode()?;
            if let Err(err) = execute!(out, EnableBracketedPaste) {
                let _ = disable_raw_mode();
                return Err(err);
            }
            debug!(?depth, "Terminal surface in raw mode");
            return Ok(Self::from_parts(out, InputSource::Keys, true, true, depth));
        }

        debug!("stdin is not a terminal, reading lines");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "Reading stdin failed");
                        break;
                    }
                }
            }
        });
        Ok(Self::from_parts(
            out,
            InputSource::Lines(rx),
            false,
            stdout_tty,
            depth,
        ))
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn from_parts(out: W, input: InputSource, raw: bool, styled: bool, depth: ColorDepth) -> Self {
        Self {
            out,
            input,
            raw,
            styled,
            depth,
            editing: None,
        }
    }

    fn newline(&self) -> &'static str {
        if self.raw {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Make the editor match the controller's current prompt.
    fn sync_prompt(&mut self, prompt: Option<&Prompt>) -> io::Result<()> {
        match prompt {
            None => {
                if self.editing.take().is_some_and(|editing| editing.drawn) {
                    self.erase_prompt_row()?;
                }
            }
            Some(prompt) => {
                let stale = self
                    .editing
                    .as_ref()
                    .is_none_or(|editing| editing.prompt_id != prompt.id);
                if stale {
                    if self.editing.as_ref().is_some_and(|editing| editing.drawn) {
                        self.erase_prompt_row()?;
                    }
                    self.editing = Some(Editing::new(prompt));
                }
            }
        }
        Ok(())
    }

    fn erase_prompt_row(&mut self) -> io::Result<()> {
        if self.raw {
            write!(self.out, "\r\x1b[K")?;
        } else if self.editing.as_ref().is_some_and(|editing| editing.drawn) {
            write!(self.out, "{}", self.newline())?;
        }
        Ok(())
    }

    fn draw_prompt(&mut self) -> io::Result<()> {
        let raw = self.raw;
        let Some(editing) = self.editing.as_mut() else {
            return Ok(());
        };
        if raw {
            render_line(&mut self.out, &editing.label, &editing.state, &editing.options)?;
        } else if !editing.drawn {
            write!(self.out, "{}", editing.label)?;
            self.out.flush()?;
        }
        editing.drawn = true;
        Ok(())
    }

    /// Run `write` with the prompt row temporarily out of the way.
    fn above_prompt(&mut self, write: impl FnOnce(&mut Self) -> io::Result<()>) -> io::Result<()> {
        let had_prompt = self.editing.as_ref().is_some_and(|editing| editing.drawn);
        if had_prompt {
            self.erase_prompt_row()?;
            if let Some(editing) = self.editing.as_mut() {
                editing.drawn = false;
            }
        }
        write(self)?;
        if had_prompt {
            self.draw_prompt()?;
        }
        self.out.flush()
    }

    fn write_span(&mut self, span: &Span) -> io::Result<()> {
        if !self.styled {
            return write!(self.out, "{}", span.text);
        }
        match span.tone {
            Tone::Plain => {}
            Tone::Banner => queue!(
                self.out,
                SetBackgroundColor(Color::White),
                SetForegroundColor(Color::Black)
            )?,
            Tone::Error => queue!(
                self.out,
                SetAttribute(Attribute::Bold),
                SetForegroundColor(Color::Red)
            )?,
            Tone::Notice => queue!(self.out, SetAttribute(Attribute::Dim))?,
            Tone::Author(color) => {
                if let Some(color) = author_color(color, self.depth) {
                    queue!(self.out, SetForegroundColor(color))?;
                }
            }
        }
        // Continuation lines of a message need the carriage return too.
        let text = if self.raw {
            span.text.replace('\n', "\r\n")
        } else {
            span.text.clone()
        };
        queue!(self.out, Print(text))?;
        if span.tone != Tone::Plain {
            queue!(self.out, SetAttribute(Attribute::Reset), ResetColor)?;
        }
        Ok(())
    }

    fn write_styled_line(&mut self, line: &StyledLine) -> io::Result<()> {
        for span in &line.spans {
            self.write_span(span)?;
        }
        let newline = self.newline();
        write!(self.out, "{newline}")
    }

    fn write_plain_lines(&mut self, lines: &[String]) -> io::Result<()> {
        let newline = self.newline();
        for line in lines {
            write!(self.out, "{line}{newline}")?;
        }
        Ok(())
    }

    fn poll_keys(&mut self, timeout: Duration) -> io::Result<InputPoll> {
        if !event::poll(timeout)? {
            return Ok(InputPoll::Idle);
        }
        let event = event::read()?;

        let Some(editing) = self.editing.as_mut() else {
            // Nothing to edit; Ctrl-C still leaves.
            if let Event::Key(key) = &event {
                if map_key_event_to_action(key) == Some(LineEditAction::Cancel) {
                    return Ok(InputPoll::Closed);
                }
            }
            return Ok(InputPoll::Idle);
        };

        if let Event::Resize(..) = event {
            self.draw_prompt()?;
            return Ok(InputPoll::Idle);
        }

        match apply_terminal_event(&mut editing.state, event, &editing.options) {
            LineEditOutcome::Continue { redraw } => {
                if redraw {
                    self.draw_prompt()?;
                }
                Ok(InputPoll::Idle)
            }
            LineEditOutcome::Submit(text) => {
                self.editing = None;
                write!(self.out, "\r\n")?;
                self.out.flush()?;
                Ok(InputPoll::Line(text))
            }
            LineEditOutcome::Closed => {
                self.editing = None;
                write!(self.out, "\r\n")?;
                self.out.flush()?;
                Ok(InputPoll::Closed)
            }
        }
    }

    fn poll_lines(&mut self, timeout: Duration) -> io::Result<InputPoll> {
        let InputSource::Lines(rx) = &self.input else {
            return Ok(InputPoll::Idle);
        };
        if self.editing.is_none() {
            std::thread::sleep(timeout);
            return Ok(InputPoll::Idle);
        }
        match rx.recv_timeout(timeout) {
            Ok(line) => {
                let masked = self
                    .editing
                    .take()
                    .is_some_and(|editing| editing.options.mask_mode == MaskMode::Hidden);
                // Piped input is not echoed; keep the transcript readable.
                let shown = if masked { String::new() } else { line.clone() };
                let newline = self.newline();
                write!(self.out, "{shown}{newline}")?;
                self.out.flush()?;
                Ok(InputPoll::Line(line))
            }
            Err(RecvTimeoutError::Timeout) => Ok(InputPoll::Idle),
            Err(RecvTimeoutError::Disconnected) => {
                let newline = self.newline();
                write!(self.out, "{newline}")?;
                self.editing = None;
                Ok(InputPoll::Closed)
            }
        }
    }
}

impl<W: Write> Renderer for TerminalSurface<W> {
    fn clear(&mut self) -> io::Result<()> {
        if self.raw {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
            if let Some(editing) = self.editing.as_mut() {
                editing.drawn = false;
            }
        }
        Ok(())
    }

    fn line(&mut self, line: StyledLine) -> io::Result<()> {
        self.above_prompt(|surface| surface.write_styled_line(&line))
    }

    fn page(&mut self, lines: Vec<String>) -> io::Result<()> {
        let rows = if self.raw {
            terminal::size().ok().map(|(_, rows)| rows)
        } else {
            None
        };
        if !needs_pager(lines.len(), self.raw, rows) {
            return self.above_prompt(|surface| surface.write_plain_lines(&lines));
        }

        self.above_prompt(|surface| {
            disable_raw_mode()?;
            let paged = run_pager(&lines);
            enable_raw_mode()?;
            if let Err(err) = paged {
                warn!(error = %err, "Pager unavailable, printing directly");
                surface.write_plain_lines(&lines)?;
            }
            Ok(())
        })
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn poll_input(&mut self, prompt: Option<&Prompt>, timeout: Duration) -> io::Result<InputPoll> {
        self.sync_prompt(prompt)?;
        if self.editing.as_ref().is_some_and(|editing| !editing.drawn) {
            self.draw_prompt()?;
        }
        match self.input {
            InputSource::Keys => self.poll_keys(timeout),
            InputSource::Lines(_) => self.poll_lines(timeout),
        }
    }
}

impl<W: Write> Drop for TerminalSurface<W> {
    fn drop(&mut self) {
        if !self.raw {
            return;
        }
        if self.editing.as_ref().is_some_and(|editing| editing.drawn) {
            let _ = write!(self.out, "\r\n");
        }
        let _ = execute!(self.out, DisableBracketedPaste);
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::AuthorColor;

    fn prompt(id: u64, label: &str, masked: bool) -> Prompt {
        Prompt {
            id,
            label: label.to_string(),
            masked,
            completions: Vec::new(),
        }
    }

    fn piped(styled: bool) -> (TerminalSurface<Vec<u8>>, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel();
        let surface = TerminalSurface::from_parts(
            Vec::new(),
            InputSource::Lines(rx),
            false,
            styled,
            ColorDepth::Truecolor,
        );
        (surface, tx)
    }

    fn output(surface: &TerminalSurface<Vec<u8>>) -> String {
        String::from_utf8_lossy(&surface.out).into_owned()
    }

    #[test]
    fn piped_input_answers_prompt() {
        let (mut surface, tx) = piped(false);
        tx.send("ann@example.com".to_string()).unwrap();

        let got = surface
            .poll_input(Some(&prompt(1, "Email: ", false)), Duration::from_millis(50))
            .unwrap();
        assert_eq!(got, InputPoll::Line("ann@example.com".to_string()));
        assert_eq!(output(&surface), "Email: ann@example.com\n");
    }

    #[test]
    fn piped_password_is_not_echoed() {
        let (mut surface, tx) = piped(false);
        tx.send("hunter2".to_string()).unwrap();
        let got = surface
            .poll_input(Some(&prompt(1, "Password: ", true)), Duration::from_millis(50))
            .unwrap();
        assert_eq!(got, InputPoll::Line("hunter2".to_string()));
        assert!(!output(&surface).contains("hunter2"));
    }

    #[test]
    fn end_of_piped_input_closes() {
        let (mut surface, tx) = piped(false);
        drop(tx);
        let got = surface
            .poll_input(Some(&prompt(1, "> ", false)), Duration::from_millis(50))
            .unwrap();
        assert_eq!(got, InputPoll::Closed);
    }

    #[test]
    fn no_prompt_means_idle() {
        let (mut surface, tx) = piped(false);
        tx.send("early".to_string()).unwrap();
        let got = surface.poll_input(None, Duration::from_millis(1)).unwrap();
        assert_eq!(got, InputPoll::Idle);

        // The early line is kept for the next prompt.
        let got = surface
            .poll_input(Some(&prompt(2, "> ", false)), Duration::from_millis(50))
            .unwrap();
        assert_eq!(got, InputPoll::Line("early".to_string()));
    }

    #[test]
    fn raw_output_redraws_prompt_after_interleaved_line() {
        let (_tx, rx) = mpsc::channel::<String>();
        let mut surface = TerminalSurface::from_parts(
            Vec::new(),
            InputSource::Lines(rx),
            true,
            false,
            ColorDepth::Truecolor,
        );
        surface.sync_prompt(Some(&prompt(1, "> ", false))).unwrap();
        if let Some(editing) = surface.editing.as_mut() {
            editing.state = LineEditorState::with_text("#ra".to_string());
        }
        surface.draw_prompt().unwrap();
        surface.out.clear();

        surface
            .line(StyledLine::plain("Ann: hi"))
            .unwrap();
        let written = output(&surface);
        assert!(written.starts_with("\r\x1b[K"), "{written:?}");
        assert!(written.contains("Ann: hi\r\n"));
        assert!(written.ends_with("\r\x1b[K> #ra\r\x1b[5C"), "{written:?}");
    }

    #[test]
    fn styled_author_uses_true_color() {
        let (mut surface, _tx) = piped(true);
        let line = StyledLine::toned("Ann", Tone::Author(AuthorColor(0x3498db)))
            .push(": ", Tone::Plain)
            .push("hi", Tone::Plain);
        surface.line(line).unwrap();
        let written = output(&surface);
        assert!(written.contains("38;2;52;152;219"), "{written:?}");
        assert!(written.contains("Ann"));
        assert!(written.ends_with(": hi\n"));
    }

    #[test]
    fn unstyled_output_is_plain_text() {
        let (mut surface, _tx) = piped(false);
        surface.line(StyledLine::error("Password is incorrect.")).unwrap();
        surface
            .page(vec!["0: General".to_string(), "1: Dev".to_string()])
            .unwrap();
        assert_eq!(
            output(&surface),
            "Password is incorrect.\n0: General\n1: Dev\n"
        );
    }
}
