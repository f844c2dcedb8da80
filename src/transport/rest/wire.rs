//! JSON payloads exchanged with the REST API.

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::event::Event;
use crate::core::model::{Channel, Guild, GuildId};

/// Channel types that carry text messages: guild text and announcement.
const TEXT_CHANNEL_TYPES: [u8; 2] = [0, 5];

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireGuild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChannelDetail {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub last_message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRole {
    pub id: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct WireAuthor {
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireMember {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub channel_id: String,
    pub author: WireAuthor,
    #[serde(default)]
    pub member: Option<WireMember>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

impl WireMessage {
    /// Guild nickname, then global display name, then account name.
    pub fn display_name(&self) -> &str {
        self.member
            .as_ref()
            .and_then(|member| member.nick.as_deref())
            .or(self.author.global_name.as_deref())
            .unwrap_or(&self.author.username)
    }

    /// Color of the highest positioned colored role the author holds.
    pub fn role_color(&self, roles: &[WireRole]) -> u32 {
        let Some(member) = self.member.as_ref() else {
            return 0;
        };
        roles
            .iter()
            .filter(|role| role.color != 0 && member.roles.contains(&role.id))
            .max_by_key(|role| role.position)
            .map(|role| role.color)
            .unwrap_or(0)
    }
}

/// Build a guild from its listing entry and raw channels, keeping text channels in position order.
pub fn guild_from_wire(guild: WireGuild, mut channels: Vec<WireChannel>) -> Guild {
    channels.retain(|channel| TEXT_CHANNEL_TYPES.contains(&channel.kind));
    channels.sort_by_key(|channel| channel.position);

    let guild_id = GuildId(guild.id);
    let channels = channels
        .into_iter()
        .map(|channel| {
            let name = channel.name.unwrap_or_else(|| channel.id.clone());
            Channel::new(channel.id, name, guild_id.clone())
        })
        .collect();
    Guild {
        id: guild_id,
        name: guild.name,
        channels,
    }
}

/// Order two snowflake ids numerically without parsing them.
pub fn compare_snowflakes(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Map a rejected password login body to the event the session understands.
pub fn classify_login_failure(body: &str) -> Event {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Event::LoginWrongPassword;
    };
    if value.get("captcha_key").is_some() {
        return Event::LoginCaptchaRequired;
    }
    let mut codes = Vec::new();
    collect_error_codes(&value, &mut codes);
    if codes.iter().any(|code| code.contains("EMAIL")) {
        Event::LoginMalformedEmail
    } else {
        Event::LoginWrongPassword
    }
}

fn collect_error_codes(value: &Value, codes: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if key == "code" {
                    if let Value::String(code) = nested {
                        codes.push(code.clone());
                    }
                }
                collect_error_codes(nested, codes);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_error_codes(item, codes)),
        _ => {}
    }
}

/// Longest back-off honoured from a 429 body.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Wait requested by a 429 body, if it carries one, capped at [`MAX_RETRY_AFTER`].
pub fn retry_after(body: &str) -> Option<Duration> {
    let parsed: RateLimitBody = serde_json::from_str(body).ok()?;
    if parsed.retry_after.is_nan() || parsed.retry_after < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(parsed.retry_after).unwrap_or(MAX_RETRY_AFTER);
    Some(wait.min(MAX_RETRY_AFTER))
}
