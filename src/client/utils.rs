//! URL and proxy helpers.
//!
//! Stream proxies come from one of two places:
//!
//! - an explicit proxy URL in the configuration, used for every host
//! - the environment (`HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY`, `NO_PROXY`
//!   and their lower-case forms) through hyper-util's [`Matcher`]. `ws://`
//!   follows the `http` rules and `wss://` the `https` rules. Loopback hosts
//!   are always dialed directly in this mode.

use crate::error::{KciError, Result};
use http::Uri;
use hyper_util::client::proxy::matcher::{Intercept, Matcher};
use url::Url;

/// Join a base URL and an absolute path.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Whether `host` names the local machine.
pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<std::net::IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

/// Give a scheme-less proxy value such as `proxy:3128` an `http://` prefix.
pub fn normalize_proxy_url(proxy: &str) -> String {
    let proxy = proxy.trim();
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}

/// Proxy selection for message streams.
pub struct ProxyRules {
    matcher: Matcher,
    bypass_loopback: bool,
}

impl ProxyRules {
    /// Send every stream through `proxy`.
    ///
    /// # Errors
    ///
    /// [`KciError::InvalidUrl`] when `proxy` does not parse as a URL.
    pub fn explicit(proxy: &str) -> Result<Self> {
        let url = Url::parse(&normalize_proxy_url(proxy))?;
        Ok(ProxyRules {
            matcher: Matcher::builder().all(url.to_string()).build(),
            bypass_loopback: false,
        })
    }

    /// Rules read from the process environment.
    pub fn from_env() -> Self {
        Self::from_matcher(Matcher::from_env())
    }

    /// Environment-style rules from an already built matcher.
    pub fn from_matcher(matcher: Matcher) -> Self {
        ProxyRules {
            matcher,
            bypass_loopback: true,
        }
    }

    /// Proxy for a `ws://` or `wss://` URI, or `None` to dial directly.
    pub fn intercept(&self, uri: &Uri) -> Option<Intercept> {
        let host = uri.host()?;
        if self.bypass_loopback && is_loopback_host(host) {
            return None;
        }
        self.matcher.intercept(&http_equivalent(uri).ok()?)
    }
}

/// `http(s)://host:port` for a stream URI, with the scheme's default port
/// filled in. Used both to match proxy rules and as the `CONNECT` target.
pub fn http_equivalent(uri: &Uri) -> Result<Uri> {
    let host = uri
        .host()
        .ok_or_else(|| KciError::Proxy(format!("no host in {uri}")))?;
    let secure = matches!(uri.scheme_str(), Some("wss") | Some("https"));
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{host}:{port}")
        .parse()
        .map_err(|e: http::uri::InvalidUri| KciError::Proxy(e.to_string()))
}
