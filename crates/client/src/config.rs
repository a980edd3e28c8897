//! Client configuration (environment + builder overrides).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// REST/WS base URL of the Zhex API.
pub const ENV_API_URL: &str = "NEXT_PUBLIC_API_URL";
/// Value of the `X-Forwarded-Host` header used by the API for routing.
pub const ENV_FORWARDED_HOST: &str = "NEXT_PUBLIC_FORWADED_HOST";
/// Optional path of the sqlite file holding persisted client state.
pub const ENV_STATE_PATH: &str = "ZHEX_STATE_PATH";
/// Optional per-request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "ZHEX_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings of the realtime channel (namespace and reconnect bounds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Socket namespace appended to the API base URL.
    pub namespace: String,
    /// Automatic reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt; doubles on each attempt.
    pub base_delay: Duration,
    /// Upper bound for any single reconnect delay.
    pub max_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            namespace: "/dashboard".to_string(),
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Everything the client needs to talk to the API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub forwarded_host: Option<String>,
    pub state_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub realtime: RealtimeConfig,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            forwarded_host: None,
            state_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            realtime: RealtimeConfig::default(),
        }
    }

    /// Load from the process environment, reading a `.env` file first if one
    /// exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup function (tests, embedded hosts).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup(ENV_API_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        let api_url = parse_api_url(&raw_url)?;

        let mut config = Self::new(api_url);

        config.forwarded_host = lookup(ENV_FORWARDED_HOST).filter(|v| !v.trim().is_empty());
        if config.forwarded_host.is_none() {
            tracing::debug!("{ENV_FORWARDED_HOST} not set; requests go out without X-Forwarded-Host");
        }

        config.state_path = lookup(ENV_STATE_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_REQUEST_TIMEOUT,
                reason: format!("{e}"),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_forwarded_host(mut self, host: impl Into<String>) -> Self {
        self.forwarded_host = Some(host.into());
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    /// Absolute URL of an API path (`/auth/login` -> `{base}/auth/login`).
    pub fn endpoint(&self, path: &str) -> Url {
        join_path(&self.api_url, path)
    }

    /// WebSocket URL of the realtime namespace (`http` -> `ws`, `https` -> `wss`).
    pub fn realtime_url(&self) -> Result<Url, ConfigError> {
        let mut url = join_path(&self.api_url, &self.realtime.namespace);
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| ConfigError::Invalid {
            key: ENV_API_URL,
            reason: "cannot derive a websocket URL".to_string(),
        })?;
        Ok(url)
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        key: ENV_API_URL,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            key: ENV_API_URL,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

/// Append `path` to the base URL, keeping any path prefix of the base
/// (`https://host/api` + `/auth/login` -> `https://host/api/auth/login`).
fn join_path(base: &Url, path: &str) -> Url {
    let prefix = base.path().trim_end_matches('/');
    let suffix = path.trim_start_matches('/');
    let mut url = base.clone();
    url.set_path(&format!("{prefix}/{suffix}"));
    url.set_query(None);
    url
}
