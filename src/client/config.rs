//! Client configuration.

use crate::auth::Credential;
use crate::protocol::constants::{
    HTTP_SCHEME, KEEP_ALIVE_PERIOD, KEEP_ALIVE_WRITE_DEADLINE, STREAM_QUEUE_CAPACITY, WS_SCHEME,
};
use std::fmt;
use std::time::Duration;

/// Configuration of one [`KciClient`](super::KciClient).
///
/// Everything the client needs is held here and handed over at construction;
/// there is no process-wide state. Base URLs are derived from `host` by
/// [`ClientConfig::new`] and can be overridden afterwards, e.g. to talk to a
/// plain-text test server.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service host, e.g. `kci.example.com`.
    pub host: String,
    /// Base URL of REST calls (`https://{host}` by default).
    pub base_url: String,
    /// Base URL of message streams (`wss://{host}` by default).
    pub stream_base_url: String,
    /// Public access key.
    pub access_key: String,
    /// Secret key. Never logged.
    pub secret_key: String,
    /// `User-Agent` sent on requests and stream handshakes. Empty disables it.
    pub user_agent: String,
    /// Whole-request timeout in milliseconds. Zero means no timeout.
    pub request_timeout_ms: u64,
    /// Explicit proxy URL. Empty means "take it from the environment".
    pub proxy_url: String,
    /// Idle connections kept per host by the default transport.
    pub max_idle_per_host: usize,
    /// Log every request at debug level.
    pub enable_logging: bool,
    /// Message stream settings.
    pub stream: StreamConfig,
}

impl ClientConfig {
    /// Configuration for a host with the given credentials.
    pub fn new(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        let host = host.into();
        ClientConfig {
            base_url: format!("{HTTP_SCHEME}{host}"),
            stream_base_url: format!("{WS_SCHEME}{host}"),
            host,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ..Default::default()
        }
    }

    /// Override the REST base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the stream base URL.
    pub fn with_stream_base_url(mut self, stream_base_url: impl Into<String>) -> Self {
        self.stream_base_url = stream_base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set an explicit proxy.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = proxy_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replace the stream settings.
    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Credential built from the configured keys.
    pub fn credential(&self) -> Credential {
        Credential::new(self.access_key.clone(), self.secret_key.clone().into_bytes())
    }

    /// `User-Agent` when one is configured.
    pub fn user_agent(&self) -> Option<&str> {
        Some(self.user_agent.as_str()).filter(|ua| !ua.is_empty())
    }

    /// Request timeout when one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Explicit proxy when one is configured.
    pub fn proxy_url(&self) -> Option<&str> {
        Some(self.proxy_url.as_str()).filter(|p| !p.is_empty())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: String::new(),
            base_url: String::new(),
            stream_base_url: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            user_agent: default_user_agent(),
            request_timeout_ms: 0,
            proxy_url: String::new(),
            max_idle_per_host: 16,
            enable_logging: false,
            stream: StreamConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .field("stream_base_url", &self.stream_base_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("proxy_url", &self.proxy_url)
            .field("max_idle_per_host", &self.max_idle_per_host)
            .field("enable_logging", &self.enable_logging)
            .field("stream", &self.stream)
            .finish()
    }
}

/// Settings of an open message stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Undelivered messages buffered before the reader stalls.
    pub queue_capacity: usize,
    /// Period between keep-alive pings.
    pub keep_alive_period: Duration,
    /// Write deadline of a single ping.
    pub write_deadline: Duration,
    /// `User-Agent` sent on the handshake. Filled from the client config.
    pub user_agent: Option<String>,
    /// Explicit proxy. Filled from the client config.
    pub proxy_url: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            queue_capacity: STREAM_QUEUE_CAPACITY,
            keep_alive_period: KEEP_ALIVE_PERIOD,
            write_deadline: KEEP_ALIVE_WRITE_DEADLINE,
            user_agent: None,
            proxy_url: None,
        }
    }
}

fn default_user_agent() -> String {
    format!("kci-client/{}", env!("CARGO_PKG_VERSION"))
}
