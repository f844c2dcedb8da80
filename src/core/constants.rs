//! Shared constants used across the application

/// Value stored in the `Token` key when no token has been saved.
pub const PLACEHOLDER_TOKEN: &str = "placeholder_token";

/// Where users are sent when the service demands a captcha.
pub const WEB_LOGIN_URL: &str = "https://discord.com/login";

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;

/// Consecutive failed polls before the feed is declared lost.
pub const MAX_POLL_FAILURES: u32 = 5;
