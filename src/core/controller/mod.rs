//! Session state machine.
//!
//! The controller is the only owner of [`Session`]. It is driven from two sides:
//! answered prompts ([`SessionController::handle_input`]) and hub events
//! ([`SessionController::handle_event`]), plus the results of commands it asked for
//! earlier. Every entry point renders through a [`Renderer`] and returns the
//! [`SessionCommand`]s the driver must carry out; the controller itself never blocks
//! and never talks to the transport directly.

#[cfg(test)]
mod tests;

use std::error::Error;
use std::fmt;
use std::io;

use tracing::{debug, info, warn};

use crate::core::constants::WEB_LOGIN_URL;
use crate::core::event::{Event, Message};
use crate::core::hub::ListenerError;
use crate::core::model::{ChannelId, Guild};
use crate::core::session::Session;
use crate::core::validation::SelectionValidator;
use crate::transport::{Credentials, TransportError};
use crate::ui::surface::{Prompt, Renderer, StyledLine, Tone};
use crate::utils::input::escape_message_content;

const EMAIL_PROMPT: &str = "Email: ";
const PASSWORD_PROMPT: &str = "Password: ";
const REMEMBER_PROMPT: &str = "Automatically login in the future? y/n: ";
const REMEMBER_RETRY_PROMPT: &str = "Invalid selection. Please select y/n: ";
const SELECTION_PROMPT: &str = "> ";

const NAVIGATION_COMMANDS: [&str; 4] = ["/channels", "/guilds", "/help", "/quit"];

/// Work the driver performs on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Authenticate(Credentials),
    LoadGuilds,
    Subscribe(ChannelId),
    /// Save the login outcome: the token when `remember` is set, the preference always.
    PersistCredentials { remember: bool },
    /// Overwrite the saved token with the placeholder.
    ForgetToken,
    Quit,
}

/// Coarse view of where the session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoggedOut,
    LoggingIn,
    GuildSelection,
    ChannelSelection,
    ChannelOpen,
    Finished,
}

/// Failures the session cannot recover from.
#[derive(Debug)]
pub enum SessionError {
    Transport(TransportError),
    /// The inbound queue behind the hub listener closed.
    Listener(ListenerError),
    Io(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Transport(err) => write!(f, "{err}"),
            SessionError::Listener(err) => write!(f, "{err}"),
            SessionError::Io(err) => write!(f, "Terminal error: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Transport(err) => Some(err),
            SessionError::Listener(err) => Some(err),
            SessionError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err)
    }
}

impl From<ListenerError> for SessionError {
    fn from(err: ListenerError) -> Self {
        SessionError::Listener(err)
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

pub type Commands = Result<Vec<SessionCommand>, SessionError>;

#[derive(Debug, Clone)]
enum LoginStep {
    Email,
    Password { email: String },
    Remember { email: String, password: String },
}

#[derive(Debug, Clone, Copy)]
enum LoginMethod {
    Token,
    Password { remember: bool },
}

#[derive(Debug, Clone)]
enum State {
    LoggedOut(LoginStep),
    LoggingIn(LoginMethod),
    GuildSelection,
    ChannelSelection,
    ChannelOpen,
    Finished,
}

pub struct SessionController {
    session: Session,
    state: State,
    /// Guild snapshot; `None` while a load is in flight.
    guilds: Option<Vec<Guild>>,
    validator: Box<dyn SelectionValidator>,
    prompt: Option<Prompt>,
    next_prompt_id: u64,
}

impl SessionController {
    pub fn new(session: Session, validator: Box<dyn SelectionValidator>) -> Self {
        Self {
            session,
            state: State::LoggedOut(LoginStep::Email),
            guilds: None,
            validator,
            prompt: None,
            next_prompt_id: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn guilds(&self) -> Option<&[Guild]> {
        self.guilds.as_deref()
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::LoggedOut(_) => Phase::LoggedOut,
            State::LoggingIn(_) => Phase::LoggingIn,
            State::GuildSelection => Phase::GuildSelection,
            State::ChannelSelection => Phase::ChannelSelection,
            State::ChannelOpen => Phase::ChannelOpen,
            State::Finished => Phase::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Entry transition out of `LoggedOut`: token login when one is stored, else the email prompt.
    pub fn start(&mut self, out: &mut dyn Renderer) -> Commands {
        match self.session.auth_token() {
            Some(token) => {
                let credentials = Credentials::Token(token.to_string());
                info!("Logging in with stored token");
                self.state = State::LoggingIn(LoginMethod::Token);
                self.prompt = None;
                out.line(StyledLine::plain("Logging in..."))?;
                Ok(vec![SessionCommand::Authenticate(credentials)])
            }
            None => {
                self.ask_email();
                Ok(Vec::new())
            }
        }
    }

    pub fn handle_input(&mut self, input: &str, out: &mut dyn Renderer) -> Commands {
        let Some(answered) = self.prompt.take() else {
            debug!("Ignoring input with no pending prompt");
            return Ok(Vec::new());
        };
        let input = input.trim_end_matches(&['\r', '\n'][..]);

        match self.state.clone() {
            State::LoggedOut(step) => self.handle_login_input(step, input, answered, out),
            State::LoggingIn(_) | State::Finished => Ok(Vec::new()),
            State::GuildSelection | State::ChannelSelection | State::ChannelOpen
                if input.trim_start().starts_with('/') =>
            {
                self.handle_command(input.trim(), answered, out)
            }
            State::GuildSelection => self.handle_guild_choice(input, answered, out),
            State::ChannelSelection => self.handle_channel_choice(input, answered, out),
            State::ChannelOpen => {
                out.line(StyledLine::notice(
                    "Sending messages is not supported. Type /help for commands.",
                ))?;
                self.reprompt(&answered);
                Ok(Vec::new())
            }
        }
    }

    pub fn handle_event(&mut self, event: Event, out: &mut dyn Renderer) -> Commands {
        match event {
            Event::LoginInProgress => {
                if matches!(self.state, State::LoggingIn(_)) {
                    out.line(StyledLine::plain("Logging in..."))?;
                }
                Ok(Vec::new())
            }
            Event::LoginSuccessful => self.login_succeeded(out),
            Event::LoginMalformedEmail
            | Event::LoginWrongPassword
            | Event::LoginCaptchaRequired
            | Event::LoginTokenRejected => self.login_failed(&event, out),
            Event::MessageReceived(message) => {
                self.render_message(&message, out)?;
                Ok(Vec::new())
            }
            Event::ConnectionLost(reason) => {
                warn!(%reason, "Transport reported connection loss");
                self.state = State::Finished;
                self.prompt = None;
                Err(SessionError::Transport(TransportError::ConnectionLost(
                    reason,
                )))
            }
        }
    }

    /// A guild snapshot requested with [`SessionCommand::LoadGuilds`] has arrived.
    pub fn guilds_loaded(&mut self, guilds: Vec<Guild>, out: &mut dyn Renderer) -> Commands {
        if !matches!(self.state, State::GuildSelection) {
            debug!("Dropping guild snapshot outside guild selection");
            return Ok(Vec::new());
        }
        info!(count = guilds.len(), "Guild snapshot loaded");
        self.guilds = Some(guilds);
        self.show_guild_index(out)?;
        Ok(Vec::new())
    }

    /// The transport refused a subscription: the channel went away after it was listed.
    pub fn channel_unavailable(&mut self, channel: &ChannelId, out: &mut dyn Renderer) -> Commands {
        let Some(current) = self.session.current_channel() else {
            return Ok(Vec::new());
        };
        if &current.id != channel {
            debug!(channel_id = %channel, "Ignoring rejection for a channel that is not current");
            return Ok(Vec::new());
        }
        let name = current.name.clone();
        warn!(channel_id = %channel, "Channel disappeared after selection");

        self.session.close_channel();
        self.session.drop_channel(channel);
        if let Some(guilds) = self.guilds.as_mut() {
            for guild in guilds.iter_mut() {
                guild.channels.retain(|c| &c.id != channel);
            }
        }

        out.line(StyledLine::error(format!("#{name} is no longer available.")))?;
        self.enter_channel_selection(out)?;
        Ok(Vec::new())
    }

    /// Record the result of a password login once the token is known.
    pub fn remember_token(&mut self, token: Option<String>, remember: bool) {
        if remember {
            self.session.set_credentials(token, true);
        } else {
            self.session.set_credentials(None, false);
        }
    }

    /// The input side closed; wind the session down.
    pub fn cancel(&mut self) -> Vec<SessionCommand> {
        self.state = State::Finished;
        self.prompt = None;
        vec![SessionCommand::Quit]
    }

    fn handle_login_input(
        &mut self,
        step: LoginStep,
        input: &str,
        answered: Prompt,
        out: &mut dyn Renderer,
    ) -> Commands {
        match step {
            LoginStep::Email => {
                let email = input.trim();
                if email.is_empty() {
                    self.reprompt(&answered);
                    return Ok(Vec::new());
                }
                self.state = State::LoggedOut(LoginStep::Password {
                    email: email.to_string(),
                });
                self.ask(PASSWORD_PROMPT, true, Vec::new());
                Ok(Vec::new())
            }
            LoginStep::Password { email } => {
                let password = input.to_string();
                if self.session.auto_login() {
                    return self.submit_password(email, password, true, out);
                }
                self.state = State::LoggedOut(LoginStep::Remember { email, password });
                self.ask(REMEMBER_PROMPT, false, vec!["y".into(), "n".into()]);
                Ok(Vec::new())
            }
            LoginStep::Remember { email, password } => match input.trim() {
                "y" => self.submit_password(email, password, true, out),
                "n" => self.submit_password(email, password, false, out),
                _ => {
                    self.state = State::LoggedOut(LoginStep::Remember { email, password });
                    self.ask(REMEMBER_RETRY_PROMPT, false, vec!["y".into(), "n".into()]);
                    Ok(Vec::new())
                }
            },
        }
    }

    fn submit_password(
        &mut self,
        email: String,
        password: String,
        remember: bool,
        out: &mut dyn Renderer,
    ) -> Commands {
        self.state = State::LoggingIn(LoginMethod::Password { remember });
        self.prompt = None;
        out.line(StyledLine::plain("Logging in..."))?;
        Ok(vec![SessionCommand::Authenticate(Credentials::Password {
            email,
            password,
        })])
    }

    fn login_succeeded(&mut self, out: &mut dyn Renderer) -> Commands {
        let State::LoggingIn(method) = self.state else {
            debug!("Login success outside of a login attempt; ignoring");
            return Ok(Vec::new());
        };
        info!("Logged in");

        let mut commands = Vec::new();
        if let LoginMethod::Password { remember } = method {
            commands.push(SessionCommand::PersistCredentials { remember });
        }

        self.state = State::GuildSelection;
        self.guilds = None;
        self.prompt = None;
        out.clear()?;
        out.line(StyledLine::banner("You are logged in."))?;
        commands.push(SessionCommand::LoadGuilds);
        Ok(commands)
    }

    fn login_failed(&mut self, event: &Event, out: &mut dyn Renderer) -> Commands {
        let State::LoggingIn(method) = self.state else {
            warn!(?event, "Login failure outside of a login attempt; ignoring");
            return Ok(Vec::new());
        };

        match event {
            Event::LoginMalformedEmail => {
                out.line(StyledLine::error("Not a well formed email address."))?;
            }
            Event::LoginWrongPassword => {
                out.line(StyledLine::error("Password is incorrect."))?;
            }
            Event::LoginCaptchaRequired => {
                out.line(StyledLine::error("Captcha required."))?;
                out.line(StyledLine::error(
                    "Please login through the web client first.",
                ))?;
                out.line(StyledLine::error(WEB_LOGIN_URL))?;
            }
            _ => {
                out.line(StyledLine::error(
                    "The saved login token was rejected. Please log in again.",
                ))?;
            }
        }

        let mut commands = Vec::new();
        if matches!(method, LoginMethod::Token) {
            self.session.forget_token();
            commands.push(SessionCommand::ForgetToken);
        }
        self.ask_email();
        Ok(commands)
    }

    fn handle_guild_choice(&mut self, input: &str, answered: Prompt, out: &mut dyn Renderer) -> Commands {
        let Some(guilds) = self.guilds.as_ref() else {
            return Ok(Vec::new());
        };
        match self.validator.guild_index(input, guilds.len()) {
            Ok(index) => {
                let guild = guilds[index].clone();
                self.select_guild(guild, out)?;
                Ok(Vec::new())
            }
            Err(err) => {
                out.line(StyledLine::error(err.message()))?;
                self.reprompt(&answered);
                Ok(Vec::new())
            }
        }
    }

    fn handle_channel_choice(
        &mut self,
        input: &str,
        answered: Prompt,
        out: &mut dyn Renderer,
    ) -> Commands {
        let Some(guild) = self.session.current_guild() else {
            return self.back_to_guilds(out);
        };
        match self.validator.channel(input, &guild.channels) {
            Ok(channel) => {
                let channel = channel.clone();
                let guild_name = guild.name.clone();
                info!(channel_id = %channel.id, guild = %guild_name, "Opening channel");

                self.session.open_channel(channel.clone());
                self.state = State::ChannelOpen;
                out.clear()?;
                out.line(StyledLine::banner(format!(
                    "#{} in {}",
                    channel.name, guild_name
                )))?;
                out.line(StyledLine::notice(
                    "Type /channels to switch channels, /guilds to switch servers, /quit to exit.",
                ))?;
                self.ask(SELECTION_PROMPT, false, command_completions());
                Ok(vec![SessionCommand::Subscribe(channel.id)])
            }
            Err(err) => {
                out.line(StyledLine::error(err.message()))?;
                self.reprompt(&answered);
                Ok(Vec::new())
            }
        }
    }

    fn handle_command(&mut self, command: &str, answered: Prompt, out: &mut dyn Renderer) -> Commands {
        match command {
            "/quit" => Ok(self.cancel()),
            "/guilds" => self.back_to_guilds(out),
            "/channels" => {
                if self.session.current_guild().is_none() {
                    out.line(StyledLine::error("Select a server first."))?;
                    self.reprompt(&answered);
                    return Ok(Vec::new());
                }
                self.session.close_channel();
                out.clear()?;
                self.enter_channel_selection(out)?;
                Ok(Vec::new())
            }
            "/help" => {
                out.line(StyledLine::notice("/channels  pick another channel in this server"))?;
                out.line(StyledLine::notice("/guilds    reload the server list"))?;
                out.line(StyledLine::notice("/quit      exit"))?;
                self.reprompt(&answered);
                Ok(Vec::new())
            }
            other => {
                out.line(StyledLine::error(format!(
                    "Unknown command {other}. Type /help for commands."
                )))?;
                self.reprompt(&answered);
                Ok(Vec::new())
            }
        }
    }

    fn back_to_guilds(&mut self, out: &mut dyn Renderer) -> Commands {
        self.session.leave_guild();
        self.state = State::GuildSelection;
        self.guilds = None;
        self.prompt = None;
        out.clear()?;
        out.line(StyledLine::notice("Loading servers..."))?;
        Ok(vec![SessionCommand::LoadGuilds])
    }

    fn select_guild(&mut self, guild: Guild, out: &mut dyn Renderer) -> io::Result<()> {
        info!(guild = %guild.name, "Guild selected");
        self.session.leave_guild();
        out.clear()?;
        out.line(StyledLine::banner(format!("Connected to {}", guild.name)))?;
        self.session.select_guild(guild);
        self.enter_channel_selection(out)
    }

    fn enter_channel_selection(&mut self, out: &mut dyn Renderer) -> io::Result<()> {
        let Some(guild) = self.session.current_guild() else {
            return self.show_guild_index(out);
        };

        if guild.channels.is_empty() {
            let name = guild.name.clone();
            out.line(StyledLine::error(format!(
                "No text channels available in {name}."
            )))?;
            self.session.leave_guild();
            self.state = State::GuildSelection;
            return self.show_guild_index(out);
        }

        let tokens: Vec<String> = guild.channels.iter().map(|c| c.token()).collect();
        out.page(tokens.clone())?;
        out.line(StyledLine::plain(
            "Select a channel by entering the corresponding #channel-name",
        ))?;

        self.state = State::ChannelSelection;
        let mut completions = tokens;
        completions.extend(command_completions());
        self.ask(SELECTION_PROMPT, false, completions);
        Ok(())
    }

    fn show_guild_index(&mut self, out: &mut dyn Renderer) -> io::Result<()> {
        self.state = State::GuildSelection;
        let guilds = self.guilds.as_deref().unwrap_or_default();
        if guilds.is_empty() {
            out.line(StyledLine::error("No servers available."))?;
            out.line(StyledLine::notice(
                "Type /guilds to reload the list or /quit to exit.",
            ))?;
        } else {
            let index = guilds
                .iter()
                .enumerate()
                .map(|(i, guild)| format!("{i}: {}", guild.name))
                .collect();
            out.page(index)?;
            out.line(StyledLine::plain(
                "Select a server by entering the corresponding server number",
            ))?;
        }
        self.ask(SELECTION_PROMPT, false, command_completions());
        Ok(())
    }

    fn render_message(&self, message: &Message, out: &mut dyn Renderer) -> io::Result<()> {
        if !self.session.channel_open() {
            return Ok(());
        }
        let Some(current) = self.session.current_channel() else {
            return Ok(());
        };
        if current.id != message.channel_id {
            return Ok(());
        }

        let line = StyledLine::toned(message.author.clone(), Tone::Author(message.author_color))
            .push(": ", Tone::Plain)
            .push(escape_message_content(&message.content), Tone::Plain);
        out.line(line)
    }

    fn ask_email(&mut self) {
        self.state = State::LoggedOut(LoginStep::Email);
        self.ask(EMAIL_PROMPT, false, Vec::new());
    }

    fn ask(&mut self, label: &str, masked: bool, completions: Vec<String>) {
        self.next_prompt_id += 1;
        self.prompt = Some(Prompt {
            id: self.next_prompt_id,
            label: label.to_string(),
            masked,
            completions,
        });
    }

    fn reprompt(&mut self, answered: &Prompt) {
        self.ask(&answered.label, answered.masked, answered.completions.clone());
    }
}

fn command_completions() -> Vec<String> {
    NAVIGATION_COMMANDS.iter().map(|c| c.to_string()).collect()
}
