#[cfg(test)]
use crate::core::model::Guild;
#[cfg(test)]
use crate::ui::surface::{InputPoll, Prompt, Renderer, StyledLine, Surface};
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::io;
#[cfg(test)]
use std::time::{Duration, Instant};

/// Collects everything the controller renders.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub lines: Vec<StyledLine>,
    pub pages: Vec<Vec<String>>,
    pub clears: usize,
}

#[cfg(test)]
impl RecordingRenderer {
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(StyledLine::text).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text().contains(needle))
            || self.pages.iter().flatten().any(|entry| entry.contains(needle))
    }

    pub fn last_text(&self) -> Option<String> {
        self.lines.last().map(StyledLine::text)
    }

    pub fn reset(&mut self) {
        self.lines.clear();
        self.pages.clear();
        self.clears = 0;
    }
}

#[cfg(test)]
impl Renderer for RecordingRenderer {
    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn line(&mut self, line: StyledLine) -> io::Result<()> {
        self.lines.push(line);
        Ok(())
    }

    fn page(&mut self, lines: Vec<String>) -> io::Result<()> {
        self.pages.push(lines);
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Answer the next prompt with this line.
    Answer(String),
    /// Stay idle until something containing this text has been rendered.
    WaitFor(String),
}

/// A surface that answers prompts from a script and records output.
///
/// Once the script runs out (or a wait exceeds its deadline) the surface reports
/// `Closed`, which makes the driver quit.
#[cfg(test)]
pub struct ScriptedSurface {
    pub output: RecordingRenderer,
    pub prompts: Vec<Prompt>,
    steps: VecDeque<ScriptStep>,
    deadline: Instant,
    pub timed_out: bool,
}

#[cfg(test)]
impl ScriptedSurface {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            output: RecordingRenderer::default(),
            prompts: Vec::new(),
            steps: steps.into_iter().collect(),
            deadline: Instant::now() + Duration::from_secs(10),
            timed_out: false,
        }
    }
}

#[cfg(test)]
impl Renderer for ScriptedSurface {
    fn clear(&mut self) -> io::Result<()> {
        self.output.clear()
    }

    fn line(&mut self, line: StyledLine) -> io::Result<()> {
        self.output.line(line)
    }

    fn page(&mut self, lines: Vec<String>) -> io::Result<()> {
        self.output.page(lines)
    }
}

#[cfg(test)]
impl Surface for ScriptedSurface {
    fn poll_input(&mut self, prompt: Option<&Prompt>, timeout: Duration) -> io::Result<InputPoll> {
        if Instant::now() > self.deadline {
            self.timed_out = true;
            return Ok(InputPoll::Closed);
        }
        match self.steps.front().cloned() {
            None => Ok(InputPoll::Closed),
            Some(ScriptStep::WaitFor(needle)) => {
                if self.output.contains(&needle) {
                    self.steps.pop_front();
                } else {
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                }
                Ok(InputPoll::Idle)
            }
            Some(ScriptStep::Answer(line)) => match prompt {
                Some(prompt) => {
                    self.prompts.push(prompt.clone());
                    self.steps.pop_front();
                    Ok(InputPoll::Line(line))
                }
                None => {
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(InputPoll::Idle)
                }
            },
        }
    }
}

#[cfg(test)]
pub fn answer(line: &str) -> ScriptStep {
    ScriptStep::Answer(line.to_string())
}

#[cfg(test)]
pub fn wait_for(text: &str) -> ScriptStep {
    ScriptStep::WaitFor(text.to_string())
}

/// `General` (#welcome) and `Dev` (#chat, #random).
#[cfg(test)]
pub fn sample_guilds() -> Vec<Guild> {
    vec![
        Guild::new("g-general", "General").with_channel("c-welcome", "welcome"),
        Guild::new("g-dev", "Dev")
            .with_channel("c-chat", "chat")
            .with_channel("c-random", "random"),
    ]
}
