//! Guild and channel snapshots handed out by the transport.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuildId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(pub String);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GuildId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A text-capable channel inside a guild.
///
/// `guild_id` is a back-reference only; channels never reach into their guild.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub guild_id: GuildId,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, guild_id: GuildId) -> Self {
        Self {
            id: ChannelId(id.into()),
            name: name.into(),
            guild_id,
        }
    }

    /// The `#name` token users type to pick this channel.
    pub fn token(&self) -> String {
        format!("#{}", self.name)
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

/// Immutable guild snapshot taken after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    /// Text channels in display order.
    pub channels: Vec<Channel>,
}

impl Guild {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: GuildId(id.into()),
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let channel = Channel::new(id, name, self.id.clone());
        self.channels.push(channel);
        self
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|channel| &channel.id == id)
    }
}
