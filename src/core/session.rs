use crate::core::model::{Channel, ChannelId, Guild};

/// Process-scoped navigation and credential state.
///
/// Only [`SessionController`](crate::core::controller::SessionController) holds a
/// mutable handle; everything else reads it through the controller. The setters keep
/// `channel_open` from ever being true without a current channel.
#[derive(Debug, Clone, Default)]
pub struct Session {
    auth_token: Option<String>,
    auto_login: bool,
    current_guild: Option<Guild>,
    current_channel: Option<Channel>,
    channel_open: bool,
}

impl Session {
    pub fn new(auth_token: Option<String>, auto_login: bool) -> Self {
        Self {
            auth_token,
            auto_login,
            ..Self::default()
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn auto_login(&self) -> bool {
        self.auto_login
    }

    pub fn current_guild(&self) -> Option<&Guild> {
        self.current_guild.as_ref()
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.current_channel.as_ref()
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    pub(crate) fn set_credentials(&mut self, token: Option<String>, auto_login: bool) {
        self.auth_token = token;
        self.auto_login = auto_login;
    }

    pub(crate) fn forget_token(&mut self) {
        self.auth_token = None;
    }

    pub(crate) fn select_guild(&mut self, guild: Guild) {
        self.current_guild = Some(guild);
    }

    pub(crate) fn open_channel(&mut self, channel: Channel) {
        self.current_channel = Some(channel);
        self.channel_open = true;
    }

    pub(crate) fn close_channel(&mut self) {
        self.channel_open = false;
    }

    /// Forget a channel that vanished from the selected guild.
    pub(crate) fn drop_channel(&mut self, id: &ChannelId) {
        if self.current_channel.as_ref().is_some_and(|c| &c.id == id) {
            self.channel_open = false;
            self.current_channel = None;
        }
        if let Some(guild) = self.current_guild.as_mut() {
            guild.channels.retain(|c| &c.id != id);
        }
    }

    /// Leaves the guild and drops the channel along with it.
    pub(crate) fn leave_guild(&mut self) {
        self.channel_open = false;
        self.current_channel = None;
        self.current_guild = None;
    }
}
