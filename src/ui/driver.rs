//! The session loop.
//!
//! One thread owns the controller and the surface. Hub events and the results of
//! transport calls arrive on an unbounded queue; between queue drains the surface is
//! polled for input with a short timeout, so a message for the open channel shows up
//! while a prompt is still being typed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::core::config::Config;
use crate::core::controller::{SessionCommand, SessionController, SessionError};
use crate::core::event::Event;
use crate::core::hub::{EventHub, EventListener, ListenerError};
use crate::core::model::{ChannelId, Guild};
use crate::transport::{Credentials, Transport, TransportError};
use crate::ui::surface::{InputPoll, StyledLine, Surface};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything that reaches the driver from outside the input side.
#[derive(Debug)]
pub enum Inbound {
    Gateway(Event),
    GuildsLoaded(Vec<Guild>),
    ChannelUnavailable(ChannelId),
    TransportFailed(TransportError),
}

/// Hub listener that forwards events into the driver's queue.
pub struct InboundListener {
    tx: UnboundedSender<Inbound>,
}

impl InboundListener {
    pub fn new(tx: UnboundedSender<Inbound>) -> Self {
        Self { tx }
    }
}

impl EventListener for InboundListener {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self.tx
            .send(Inbound::Gateway(event.clone()))
            .map_err(|_| ListenerError::Disconnected)
    }
}

/// Where login results are saved.
pub struct ConfigStore {
    pub config: Config,
    pub path: PathBuf,
}

impl ConfigStore {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { config, path }
    }
}

pub struct SessionDriver<S: Surface> {
    controller: SessionController,
    surface: S,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    store: ConfigStore,
    tx: UnboundedSender<Inbound>,
    rx: UnboundedReceiver<Inbound>,
    finished: bool,
}

impl<S: Surface> SessionDriver<S> {
    /// Wire a driver to `hub`: a listener is registered that feeds the inbound queue.
    pub fn new(
        controller: SessionController,
        surface: S,
        transport: Arc<dyn Transport>,
        hub: &EventHub,
        runtime: Handle,
        store: ConfigStore,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.subscribe(Arc::new(InboundListener::new(tx.clone())));
        Self {
            controller,
            surface,
            transport,
            runtime,
            store,
            tx,
            rx,
            finished: false,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &Config {
        &self.store.config
    }

    /// Run until the user quits or something fatal happens. The transport is shut down
    /// either way.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_loop();
        self.transport.shutdown();
        if let Err(err) = &result {
            error!(error = %err, "Session ended with an error");
        } else {
            info!("Session finished");
        }
        result
    }

    fn run_loop(&mut self) -> Result<(), SessionError> {
        let commands = self.controller.start(&mut self.surface)?;
        self.execute(commands)?;

        while !self.finished {
            self.drain_inbound()?;
            if self.finished {
                break;
            }

            match self
                .surface
                .poll_input(self.controller.prompt(), INPUT_POLL_INTERVAL)?
            {
                InputPoll::Idle => {}
                InputPoll::Line(line) => {
                    let commands = self.controller.handle_input(&line, &mut self.surface)?;
                    self.execute(commands)?;
                }
                InputPoll::Closed => {
                    debug!("Input closed");
                    let commands = self.controller.cancel();
                    self.execute(commands)?;
                }
            }
        }
        Ok(())
    }

    fn drain_inbound(&mut self) -> Result<(), SessionError> {
        loop {
            let inbound = match self.rx.try_recv() {
                Ok(inbound) => inbound,
                Err(TryRecvError::Empty) => return Ok(()),
                // The driver holds a sender itself, so this only happens while tearing down.
                Err(TryRecvError::Disconnected) => return Err(ListenerError::Disconnected.into()),
            };
            let commands = match inbound {
                Inbound::Gateway(event) => self.controller.handle_event(event, &mut self.surface)?,
                Inbound::GuildsLoaded(guilds) => {
                    self.controller.guilds_loaded(guilds, &mut self.surface)?
                }
                Inbound::ChannelUnavailable(channel) => self
                    .controller
                    .channel_unavailable(&channel, &mut self.surface)?,
                Inbound::TransportFailed(err) => return Err(SessionError::Transport(err)),
            };
            self.execute(commands)?;
            if self.finished {
                return Ok(());
            }
        }
    }

    fn execute(&mut self, commands: Vec<SessionCommand>) -> Result<(), SessionError> {
        for command in commands {
            debug!(?command, "Executing session command");
            match command {
                SessionCommand::Authenticate(credentials) => self.spawn_authenticate(credentials),
                SessionCommand::LoadGuilds => self.spawn_load_guilds(),
                SessionCommand::Subscribe(channel) => self.spawn_subscribe(channel),
                SessionCommand::PersistCredentials { remember } => {
                    let token = self.transport.session_token();
                    if remember && token.is_none() {
                        warn!("Login succeeded without a session token; nothing to remember");
                    }
                    self.controller.remember_token(token, remember);
                    self.store.config.record_login(self.controller.session());
                    self.save_config()?;
                }
                SessionCommand::ForgetToken => {
                    self.store.config.forget_token();
                    self.save_config()?;
                }
                SessionCommand::Quit => {
                    self.finished = true;
                }
            }
        }
        Ok(())
    }

    /// Saving is best effort: the session goes on, the user is told.
    fn save_config(&mut self) -> Result<(), SessionError> {
        match self.store.config.save_to_path(&self.store.path) {
            Ok(()) => {
                debug!(path = %self.store.path.display(), "Saved credentials");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Could not save credentials");
                self.surface
                    .line(StyledLine::error(format!("Could not save settings: {err}")))?;
                Ok(())
            }
        }
    }

    fn spawn_authenticate(&self, credentials: Credentials) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            if let Err(err) = transport.authenticate(credentials).await {
                warn!(error = %err, "Login request failed");
                forward(&tx, Inbound::TransportFailed(err));
            }
        });
    }

    fn spawn_load_guilds(&self) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let inbound = match transport.list_guilds().await {
                Ok(guilds) => Inbound::GuildsLoaded(guilds),
                Err(err) => {
                    warn!(error = %err, "Loading guilds failed");
                    Inbound::TransportFailed(err)
                }
            };
            forward(&tx, inbound);
        });
    }

    fn spawn_subscribe(&self, channel: ChannelId) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            match transport.subscribe_channel(&channel).await {
                Ok(()) => debug!(channel_id = %channel, "Subscribed"),
                Err(TransportError::UnknownChannel(gone)) => {
                    forward(&tx, Inbound::ChannelUnavailable(gone));
                }
                Err(err) => {
                    warn!(channel_id = %channel, error = %err, "Subscribing failed");
                    forward(&tx, Inbound::TransportFailed(err));
                }
            }
        });
    }
}

fn forward(tx: &UnboundedSender<Inbound>, inbound: Inbound) {
    if tx.send(inbound).is_err() {
        debug!("Driver is gone; dropping transport result");
    }
}
