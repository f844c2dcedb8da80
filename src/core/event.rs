//! Events pushed by the transport into the session.

use crate::core::model::ChannelId;

/// Author display color as a packed `0xRRGGBB` value.
///
/// Zero means "no color", matching how chat services report uncolored roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthorColor(pub u32);

impl AuthorColor {
    pub fn rgb(self) -> Option<(u8, u8, u8)> {
        if self.0 == 0 {
            return None;
        }
        let r = ((self.0 >> 16) & 0xff) as u8;
        let g = ((self.0 >> 8) & 0xff) as u8;
        let b = (self.0 & 0xff) as u8;
        Some((r, g, b))
    }
}

/// A chat message as received from the feed. Rendered once, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub author: String,
    pub author_color: AuthorColor,
    pub channel_id: ChannelId,
    pub content: String,
}

impl Message {
    pub fn new(
        channel_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            author_color: AuthorColor::default(),
            channel_id: ChannelId(channel_id.into()),
            content: content.into(),
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.author_color = AuthorColor(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LoginInProgress,
    LoginSuccessful,
    LoginMalformedEmail,
    LoginWrongPassword,
    LoginCaptchaRequired,
    /// The stored token was refused by the service.
    LoginTokenRejected,
    MessageReceived(Message),
    /// The feed is gone and will not come back on its own.
    ConnectionLost(String),
}
