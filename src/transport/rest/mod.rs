//! [`Transport`] over the service's REST API.
//!
//! Logins and listings are plain request/response calls. Messages for the subscribed
//! channel come from a background task that polls for anything newer than the last
//! message it has seen and publishes it on the hub, oldest first.

mod wire;


use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::ConnectionSection;
use crate::core::constants::MAX_POLL_FAILURES;
use crate::core::event::{Event, Message};
use crate::core::hub::EventHub;
use crate::core::model::{ChannelId, Guild, GuildId};
use crate::transport::{Credentials, Transport, TransportError};
use crate::utils::url::construct_api_url;

use wire::{
    classify_login_failure, compare_snowflakes, guild_from_wire, retry_after, ChannelDetail,
    LoginRequest, LoginResponse, WireChannel, WireGuild, WireMessage, WireRole,
};

const MESSAGE_PAGE_LIMIT: &str = "50";

/// The channel being followed and how far it has been read.
#[derive(Debug, Clone)]
struct Cursor {
    channel: ChannelId,
    guild: Option<GuildId>,
    after: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    token: Option<String>,
    cursor: Option<Cursor>,
    roles: HashMap<GuildId, Vec<WireRole>>,
}

struct Inner {
    client: reqwest::Client,
    api_base: String,
    poll_interval: Duration,
    hub: Arc<EventHub>,
    state: Mutex<FeedState>,
    /// Bumped by every subscribe; only the latest one may move the cursor.
    subscription: AtomicU64,
}

enum PollOutcome {
    Polled,
    RateLimited(Duration),
}

pub struct RestTransport {
    inner: Arc<Inner>,
    cancel_token: CancellationToken,
    poller_started: AtomicBool,
}

impl RestTransport {
    pub fn new(hub: Arc<EventHub>, connection: &ConnectionSection) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tercord/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                api_base: connection.api_base.clone(),
                poll_interval: connection.poll_interval(),
                hub,
                state: Mutex::new(FeedState::default()),
                subscription: AtomicU64::new(0),
            }),
            cancel_token: CancellationToken::new(),
            poller_started: AtomicBool::new(false),
        })
    }

    async fn login_with_password(&self, email: &str, password: &str) -> Result<(), TransportError> {
        let url = construct_api_url(&self.inner.api_base, "auth/login");
        let response = self
            .inner
            .client
            .post(url)
            .json(&LoginRequest {
                login: email,
                password,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: LoginResponse = response.json().await?;
                let token = body.token.ok_or_else(|| {
                    TransportError::Decode(
                        "login needs a second factor, which is not supported".to_string(),
                    )
                })?;
                self.logged_in(token);
                Ok(())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                let event = classify_login_failure(&body);
                info!(?event, "Password login refused");
                self.inner.publish(event);
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn login_with_token(&self, token: String) -> Result<(), TransportError> {
        let url = construct_api_url(&self.inner.api_base, "users/@me");
        let response = self
            .inner
            .client
            .get(url)
            .header(AUTHORIZATION, token.as_str())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                self.logged_in(token);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                info!("Stored token refused");
                self.inner.publish(Event::LoginTokenRejected);
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    fn logged_in(&self, token: String) {
        self.inner.lock_state().token = Some(token);
        self.start_poller();
        self.inner.publish(Event::LoginSuccessful);
    }

    fn start_poller(&self) {
        if self.poller_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            inner.run_feed(cancel_token).await;
        });
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn token(&self) -> Result<String, TransportError> {
        self.lock_state()
            .token
            .clone()
            .ok_or(TransportError::NotAuthenticated)
    }

    fn publish(&self, event: Event) -> bool {
        match self.hub.publish(event) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "Dropping event, listener gone");
                false
            }
        }
    }

    async fn get(&self, endpoint: &str, token: &str) -> Result<Response, TransportError> {
        let url = construct_api_url(&self.api_base, endpoint);
        Ok(self
            .client
            .get(url)
            .header(AUTHORIZATION, token)
            .send()
            .await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        token: &str,
    ) -> Result<T, TransportError> {
        let response = self.get(endpoint, token).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn run_feed(&self, cancel_token: CancellationToken) {
        let mut failures = 0u32;
        let mut delay = self.poll_interval;
        debug!("Message feed started");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.poll_once().await {
                Ok(PollOutcome::Polled) => {
                    failures = 0;
                    delay = self.poll_interval;
                }
                Ok(PollOutcome::RateLimited(wait)) => {
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limited");
                    delay = wait.max(self.poll_interval);
                }
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, failures, "Message poll failed");
                    if failures >= MAX_POLL_FAILURES {
                        self.publish(Event::ConnectionLost(err.to_string()));
                        break;
                    }
                    delay = self.poll_interval;
                }
            }

            if cancel_token.is_cancelled() {
                break;
            }
        }
        debug!("Message feed stopped");
    }

    async fn poll_once(&self) -> Result<PollOutcome, TransportError> {
        let (token, cursor) = {
            let state = self.lock_state();
            match (state.token.clone(), state.cursor.clone()) {
                (Some(token), Some(cursor)) => (token, cursor),
                _ => return Ok(PollOutcome::Polled),
            }
        };

        let mut query = vec![("limit", MESSAGE_PAGE_LIMIT.to_string())];
        if let Some(after) = cursor.after.as_ref() {
            query.push(("after", after.clone()));
        }
        let url = construct_api_url(&self.api_base, &format!("channels/{}/messages", cursor.channel));
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token.as_str())
            .query(&query)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            let wait = retry_after(&body).unwrap_or(self.poll_interval);
            return Ok(PollOutcome::RateLimited(wait));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let mut messages: Vec<WireMessage> = response.json().await?;
        messages.sort_by(|a, b| compare_snowflakes(&a.id, &b.id));

        let (roles, fresh) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let Some(current) = state.cursor.as_mut() else {
                return Ok(PollOutcome::Polled);
            };
            if current.channel != cursor.channel {
                // Switched channels while the request was in flight.
                return Ok(PollOutcome::Polled);
            }
            let fresh: Vec<WireMessage> = messages
                .into_iter()
                .filter(|message| match current.after.as_deref() {
                    Some(after) => compare_snowflakes(&message.id, after).is_gt(),
                    None => true,
                })
                .collect();
            if let Some(last) = fresh.last() {
                current.after = Some(last.id.clone());
            }
            let roles = cursor
                .guild
                .as_ref()
                .and_then(|guild| state.roles.get(guild).cloned())
                .unwrap_or_default();
            (roles, fresh)
        };

        for message in fresh {
            let event = Event::MessageReceived(
                Message::new(
                    message.channel_id.clone(),
                    message.display_name(),
                    message.content.clone(),
                )
                .with_color(message.role_color(&roles)),
            );
            if !self.publish(event) {
                break;
            }
        }
        Ok(PollOutcome::Polled)
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn authenticate(&self, credentials: Credentials) -> Result<(), TransportError> {
        match credentials {
            Credentials::Password { email, password } => {
                self.login_with_password(&email, &password).await
            }
            Credentials::Token(token) => self.login_with_token(token).await,
        }
    }

    async fn list_guilds(&self) -> Result<Vec<Guild>, TransportError> {
        let token = self.inner.token()?;
        let listed: Vec<WireGuild> = self.inner.get_json("users/@me/guilds", &token).await?;

        let mut guilds = Vec::with_capacity(listed.len());
        for guild in listed {
            let channels: Vec<WireChannel> = self
                .inner
                .get_json(&format!("guilds/{}/channels", guild.id), &token)
                .await?;
            guilds.push(guild_from_wire(guild, channels));
        }
        debug!(count = guilds.len(), "Listed guilds");
        Ok(guilds)
    }

    async fn subscribe_channel(&self, channel: &ChannelId) -> Result<(), TransportError> {
        let generation = self.inner.subscription.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.inner.token()?;
        let response = self.inner.get(&format!("channels/{channel}"), &token).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                return Err(TransportError::UnknownChannel(channel.clone()));
            }
            status if !status.is_success() => return Err(status_error(response).await),
            _ => {}
        }
        let detail: ChannelDetail = response.json().await?;
        let guild = detail.guild_id.map(GuildId);

        if let Some(guild_id) = guild.as_ref() {
            let cached = self.inner.lock_state().roles.contains_key(guild_id);
            if !cached {
                let roles = match self
                    .inner
                    .get_json::<Vec<WireRole>>(&format!("guilds/{guild_id}/roles"), &token)
                    .await
                {
                    Ok(roles) => roles,
                    Err(err) => {
                        warn!(guild = %guild_id, error = %err, "Role colors unavailable");
                        Vec::new()
                    }
                };
                self.inner.lock_state().roles.insert(guild_id.clone(), roles);
            }
        }

        let mut state = self.inner.lock_state();
        if self.inner.subscription.load(Ordering::SeqCst) != generation {
            debug!(channel_id = %detail.id, "Superseded by a later subscription");
            return Ok(());
        }
        info!(channel_id = %detail.id, "Subscribed");
        state.cursor = Some(Cursor {
            channel: ChannelId(detail.id),
            guild,
            after: detail.last_message_id,
        });
        Ok(())
    }

    fn session_token(&self) -> Option<String> {
        self.inner.lock_state().token.clone()
    }

    fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for RestTransport {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn status_error(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Status {
        status,
        body: body.trim().to_string(),
    }
}
