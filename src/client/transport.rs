//! Pluggable HTTP transport.
//!
//! A [`Transport`] performs one request/response exchange. The signing layer
//! is itself a `Transport` wrapped around another one, so proxying, TLS
//! settings, pooling and timeouts stay the business of whatever sits
//! underneath.

use super::config::ClientConfig;
use crate::error::{KciError, Result};
use crate::types::Body;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// One request/response exchange.
///
/// Implementations must leave the response body fully read so the connection
/// can be reused or released, on every exit path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and collect the full response.
    async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>> {
        (**self).send(request).await
    }
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Use a caller-built `reqwest::Client` as is.
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }

    /// Build a `reqwest::Client` from the client configuration.
    ///
    /// Proxies come from `proxy_url` when set, otherwise from the
    /// environment (reqwest's default).
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.max_idle_per_host);

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy_url) = config.proxy_url() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(ReqwestTransport::new(builder.build()?))
    }

    /// The wrapped client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let bytes = body.load().await.map_err(KciError::Io)?;
        let request = reqwest::Request::try_from(Request::from_parts(parts, bytes))?;

        let response = self.client.execute(request).await?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
