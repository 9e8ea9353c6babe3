//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can start against a local
//! server with zero configuration.

use std::time::Duration;

use takesix_shared::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_URL,
};
use takesix_shared::types::GameId;

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the game server.
    /// Env: `TAKESIX_SERVER_URL`
    /// Default: `http://127.0.0.1:5000`
    pub server_url: String,

    /// Interval between two synchronizer ticks.
    /// Env: `TAKESIX_POLL_INTERVAL_MS`
    /// Default: `2000`
    pub poll_interval: Duration,

    /// Timeout applied to every server request.
    /// Env: `TAKESIX_REQUEST_TIMEOUT_SECS`
    /// Default: `10`
    pub request_timeout: Duration,

    /// Credentials for `POST /login`. Both must be set for the client to log in;
    /// otherwise it relies on an existing session.
    /// Env: `TAKESIX_USERNAME`, `TAKESIX_PASSWORD`
    pub username: Option<String>,
    pub password: Option<String>,

    /// Game to follow on startup. A new game is created when unset.
    /// Env: `TAKESIX_GAME_ID`
    pub game_id: Option<GameId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            username: None,
            password: None,
            game_id: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("game_id", &self.game_id)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("TAKESIX_SERVER_URL") {
            if url.starts_with("http://") || url.starts_with("https://") {
                config.server_url = url;
            } else {
                tracing::warn!(value = %url, "Invalid TAKESIX_SERVER_URL, using default");
            }
        }

        if let Some(val) = lookup("TAKESIX_POLL_INTERVAL_MS") {
            match parse_positive(&val) {
                Ok(ms) => config.poll_interval = Duration::from_millis(ms),
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid TAKESIX_POLL_INTERVAL_MS, using default")
                }
            }
        }

        if let Some(val) = lookup("TAKESIX_REQUEST_TIMEOUT_SECS") {
            match parse_positive(&val) {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid TAKESIX_REQUEST_TIMEOUT_SECS, using default")
                }
            }
        }

        config.username = lookup("TAKESIX_USERNAME").filter(|s| !s.is_empty());
        config.password = lookup("TAKESIX_PASSWORD").filter(|s| !s.is_empty());

        if let Some(val) = lookup("TAKESIX_GAME_ID") {
            match val.trim().parse::<i64>() {
                Ok(id) => config.game_id = Some(GameId(id)),
                Err(e) => tracing::warn!(value = %val, error = %e, "Invalid TAKESIX_GAME_ID, ignoring"),
            }
        }

        config
    }

    /// Credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn parse_positive(value: &str) -> Result<u64, String> {
    let n = value
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("not a number: {e}"))?;
    if n == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(n)
}
