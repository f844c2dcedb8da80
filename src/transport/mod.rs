//! The chat-service collaborator the session talks to.
//!
//! A transport owns the wire protocol. The session only asks it to log in, list
//! guilds and follow one channel; everything it learns comes back either as a return
//! value or as an [`Event`](crate::core::event::Event) published on the hub.

#[cfg(test)]
pub mod memory;
pub mod rest;

use std::error::Error;
use std::fmt;

use async_trait::async_trait;

use crate::core::model::{ChannelId, Guild};

pub use rest::RestTransport;

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password { email: String, password: String },
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Debug)]
pub enum TransportError {
    /// The request never got a response.
    Http(reqwest::Error),
    /// The service answered with a status we cannot work with.
    Status { status: u16, body: String },
    /// The response body did not have the expected shape.
    Decode(String),
    /// The channel no longer exists or is not visible.
    UnknownChannel(ChannelId),
    /// An operation that needs a session was called before login.
    NotAuthenticated,
    ConnectionLost(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(err) => write!(f, "Request failed: {err}"),
            TransportError::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "Service responded with status {status}")
                } else {
                    write!(f, "Service responded with status {status}: {body}")
                }
            }
            TransportError::Decode(detail) => write!(f, "Unexpected response: {detail}"),
            TransportError::UnknownChannel(id) => write!(f, "Channel {id} is not available"),
            TransportError::NotAuthenticated => write!(f, "Not logged in"),
            TransportError::ConnectionLost(reason) => write!(f, "Connection lost: {reason}"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Log in. The outcome is published on the hub as exactly one login event.
    async fn authenticate(&self, credentials: Credentials) -> Result<(), TransportError>;

    /// Guild snapshot with text channels only. Valid after a successful login.
    async fn list_guilds(&self) -> Result<Vec<Guild>, TransportError>;

    /// Follow `channel`; messages for it start arriving as `MessageReceived`.
    async fn subscribe_channel(&self, channel: &ChannelId) -> Result<(), TransportError>;

    /// Token obtained by the last successful login.
    fn session_token(&self) -> Option<String>;

    /// Stop any background feed.
    fn shutdown(&self);
}
