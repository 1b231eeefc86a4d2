//! Feed configuration and endpoint derivation.

use std::time::Duration;

use reqwest::Url;

use super::{FeedError, FeedResult};
use crate::config::{
    ConfigFile, DEFAULT_FEED_BASE_URL, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::credential::Credential;
use crate::model::FeedMode;

/// Shortest polling period a running acquisition accepts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for one stream acquisition instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// HTTP base of the point-feed service, e.g. `https://host/api/tracker`.
    pub base_url: String,
    /// Entity selection.
    pub mode: FeedMode,
    /// Polling period; also advertised to the push channel.
    pub refresh_interval: Duration,
    /// Timeout for pull requests and for opening the push channel.
    pub request_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            mode: FeedMode::default(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl FeedConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: FeedMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Copy with the refresh interval raised to [`MIN_REFRESH_INTERVAL`].
    pub fn normalized(mut self) -> Self {
        self.refresh_interval = self.refresh_interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn base(&self) -> FeedResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)
            .map_err(|e| FeedError::InvalidEndpoint(format!("{}: {}", self.base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FeedError::InvalidEndpoint(format!(
                "unsupported scheme '{}' in {}",
                other, self.base_url
            ))),
        }
    }

    /// Pull endpoint: `GET <base>/snapshot?mode=<mode>`.
    pub fn snapshot_url(&self, mode: FeedMode) -> FeedResult<Url> {
        let mut url = self
            .base()?
            .join("snapshot")
            .map_err(|e| FeedError::InvalidEndpoint(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("mode", mode.as_query_value());
        Ok(url)
    }

    /// Push endpoint: `ws(s)://<base>/stream?mode=&interval=[&token=]`.
    ///
    /// `http` maps to `ws` and `https` to `wss`.
    pub fn stream_url(&self, mode: FeedMode, credential: Option<&Credential>) -> FeedResult<Url> {
        let mut url = self
            .base()?
            .join("stream")
            .map_err(|e| FeedError::InvalidEndpoint(e.to_string()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| FeedError::InvalidEndpoint(format!("cannot use {} scheme", scheme)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("mode", mode.as_query_value());
            query.append_pair("interval", &self.refresh_interval.as_secs().to_string());
            if let Some(credential) = credential {
                query.append_pair("token", credential.expose());
            }
        }
        Ok(url)
    }
}

impl From<&ConfigFile> for FeedConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            base_url: config.feed.base_url.clone(),
            mode: config.feed.mode,
            refresh_interval: Duration::from_secs(config.feed.refresh_interval),
            request_timeout: Duration::from_secs(config.feed.request_timeout),
        }
    }
}
