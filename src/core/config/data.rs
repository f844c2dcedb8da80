use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{DEFAULT_API_BASE, DEFAULT_POLL_INTERVAL_MS, PLACEHOLDER_TOKEN};
use crate::core::session::Session;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(rename = "CREDENTIALS", default)]
    pub credentials: CredentialSection,
    #[serde(rename = "CONNECTION", default)]
    pub connection: ConnectionSection,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CredentialSection {
    /// Saved login token; the placeholder means none.
    #[serde(rename = "Token", default = "placeholder_token")]
    pub token: String,
    /// Written as `"True"`/`"False"`; booleans are accepted on read.
    #[serde(rename = "AutoLogin", default, with = "auto_login_flag")]
    pub auto_login: bool,
}

impl Default for CredentialSection {
    fn default() -> Self {
        Self {
            token: placeholder_token(),
            auto_login: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConnectionSection {
    #[serde(rename = "ApiBase", default = "default_api_base")]
    pub api_base: String,
    #[serde(rename = "PollIntervalMs", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConnectionSection {
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval_ms == 0 {
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        } else {
            Duration::from_millis(self.poll_interval_ms)
        }
    }
}

impl Config {
    /// The saved token, unless it is empty or still the placeholder.
    pub fn stored_token(&self) -> Option<&str> {
        let token = self.credentials.token.trim();
        if token.is_empty() || token == PLACEHOLDER_TOKEN {
            None
        } else {
            Some(token)
        }
    }

    /// Session seeded from the saved credentials.
    pub fn session(&self) -> Session {
        Session::new(
            self.stored_token().map(str::to_string),
            self.credentials.auto_login,
        )
    }

    /// Copy the login outcome out of the session.
    ///
    /// The preference is always taken over. The token only when the session holds one,
    /// so declining auto-login leaves a previously saved token in place.
    pub fn record_login(&mut self, session: &Session) {
        self.credentials.auto_login = session.auto_login();
        if let Some(token) = session.auth_token() {
            self.credentials.token = token.to_string();
        }
    }

    pub fn forget_token(&mut self) {
        self.credentials.token = placeholder_token();
    }
}

fn placeholder_token() -> String {
    PLACEHOLDER_TOKEN.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

mod auto_login_flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => Ok(value),
            Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                other => Err(D::Error::custom(format!(
                    "AutoLogin must be True or False, got {other:?}"
                ))),
            },
        }
    }
}

/// Home-relative rendering for paths shown to the user.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
