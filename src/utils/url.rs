//! Endpoint URL construction.

/// Strip trailing slashes from a configured API base.
///
/// ```
/// use tercord::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://discord.com/api/v9/"), "https://discord.com/api/v9");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join `base_url` and `endpoint` with exactly one slash between them.
///
/// ```
/// use tercord::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://discord.com/api/v9/", "/users/@me"),
///     "https://discord.com/api/v9/users/@me"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://127.0.0.1:4000"),
            "http://127.0.0.1:4000"
        );
        assert_eq!(
            normalize_base_url("http://127.0.0.1:4000///"),
            "http://127.0.0.1:4000"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("https://discord.com/api/v9", "channels/42/messages"),
            "https://discord.com/api/v9/channels/42/messages"
        );
        assert_eq!(
            construct_api_url("http://127.0.0.1:4000/", "///auth/login"),
            "http://127.0.0.1:4000/auth/login"
        );
    }
}
