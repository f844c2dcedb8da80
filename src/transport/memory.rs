//! Scripted in-process transport for driving the session in tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::core::event::{Event, Message};
use crate::core::hub::EventHub;
use crate::core::model::{ChannelId, Guild};
use crate::transport::{Credentials, Transport, TransportError};

#[derive(Default)]
struct Script {
    logins: VecDeque<Event>,
    issued_token: String,
    token: Option<String>,
    guilds: Vec<Guild>,
    feeds: HashMap<ChannelId, Vec<Message>>,
    missing: HashSet<ChannelId>,
    calls: Vec<String>,
}

/// Answers logins from a queue of outcomes (success once the queue is empty), serves a
/// fixed guild snapshot and publishes a canned feed when a channel is subscribed.
pub struct MemoryTransport {
    hub: Arc<EventHub>,
    script: Mutex<Script>,
}

impl MemoryTransport {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            hub,
            script: Mutex::new(Script {
                issued_token: "memory-token".to_string(),
                ..Script::default()
            }),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of the next login attempt.
    pub fn with_login(self, outcome: Event) -> Self {
        self.script().logins.push_back(outcome);
        self
    }

    pub fn with_guilds(self, guilds: Vec<Guild>) -> Self {
        self.script().guilds = guilds;
        self
    }

    pub fn with_feed(self, channel: &str, messages: Vec<Message>) -> Self {
        self.script()
            .feeds
            .insert(ChannelId::from(channel), messages);
        self
    }

    pub fn with_missing_channel(self, channel: &str) -> Self {
        self.script().missing.insert(ChannelId::from(channel));
        self
    }

    pub fn issuing_token(self, token: &str) -> Self {
        self.script().issued_token = token.to_string();
        self
    }

    /// Operations performed so far, e.g. `authenticate:token` or `subscribe:c-random`.
    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    pub fn publish(&self, event: Event) {
        let _ = self.hub.publish(event);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn authenticate(&self, credentials: Credentials) -> Result<(), TransportError> {
        let outcome = {
            let mut script = self.script();
            let kind = match credentials {
                Credentials::Token(_) => "token",
                Credentials::Password { .. } => "password",
            };
            script.calls.push(format!("authenticate:{kind}"));
            let outcome = script.logins.pop_front().unwrap_or(Event::LoginSuccessful);
            if outcome == Event::LoginSuccessful {
                script.token = Some(match credentials {
                    Credentials::Token(token) => token,
                    Credentials::Password { .. } => script.issued_token.clone(),
                });
            }
            outcome
        };
        self.publish(outcome);
        Ok(())
    }

    async fn list_guilds(&self) -> Result<Vec<Guild>, TransportError> {
        let mut script = self.script();
        script.calls.push("list_guilds".to_string());
        if script.token.is_none() {
            return Err(TransportError::NotAuthenticated);
        }
        Ok(script.guilds.clone())
    }

    async fn subscribe_channel(&self, channel: &ChannelId) -> Result<(), TransportError> {
        let feed = {
            let mut script = self.script();
            script.calls.push(format!("subscribe:{channel}"));
            if script.missing.contains(channel) {
                return Err(TransportError::UnknownChannel(channel.clone()));
            }
            script.feeds.get(channel).cloned().unwrap_or_default()
        };
        for message in feed {
            self.publish(Event::MessageReceived(message));
        }
        Ok(())
    }

    fn session_token(&self) -> Option<String> {
        self.script().token.clone()
    }

    fn shutdown(&self) {
        self.script().calls.push("shutdown".to_string());
    }
}
