//! The KCI client.
//!
//! [`KciClient`] bundles a signing transport, the stream consumer and the
//! configuration they were built from. It offers the plumbing a resource layer
//! is written against: JSON verb helpers, a raw-body call and the two stream
//! endpoints.
//!
//! # Examples
//!
//! ## JSON call
//!
//! ```ignore
//! use kci_client::KciClient;
//! use serde::Deserialize;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize)]
//! struct User { login: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KciClient::new("kci.example.com", "AK", "SK")?;
//!     let user: User = client.get("/v1/user", &CancellationToken::new()).await?;
//!     println!("{}", user.login);
//!     Ok(())
//! }
//! ```
//!
//! ## Live log
//!
//! ```ignore
//! use kci_client::KciClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KciClient::new("kci.example.com", "AK", "SK")?;
//!     let mut log = client.log_stream(7, 12, 1, &CancellationToken::new()).await?;
//!     while let Some(line) = log.next().await {
//!         print!("{}", String::from_utf8_lossy(&line));
//!     }
//!     Ok(())
//! }
//! ```

use super::config::ClientConfig;
use super::signing::SigningTransport;
use super::stream::{MessageStream, StreamConsumer};
use super::transport::{ReqwestTransport, Transport};
use super::utils::join_url;
use crate::error::{KciError, Result};
use crate::protocol::constants::{paths, JSON_CONTENT_TYPE};
use crate::protocol::is_success_status;
use crate::types::Body;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Authenticated client of the KCI service.
///
/// Cloning is cheap; clones share the transport and configuration.
pub struct KciClient<T = ReqwestTransport> {
    transport: Arc<SigningTransport<T>>,
    streams: StreamConsumer,
    config: Arc<ClientConfig>,
}

impl<T> Clone for KciClient<T> {
    fn clone(&self) -> Self {
        KciClient {
            transport: self.transport.clone(),
            streams: self.streams.clone(),
            config: self.config.clone(),
        }
    }
}

impl KciClient<ReqwestTransport> {
    /// Client for `host` (e.g. `kci.example.com`) with the given keys.
    pub fn new(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(ClientConfig::new(host, access_key, secret_key))
    }

    /// Client over the default transport built from `config`.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> KciClient<T> {
    /// Client over a caller-supplied transport. The transport is wrapped so
    /// every request it carries is signed.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let mut stream = config.stream.clone();
        if stream.user_agent.is_none() {
            stream.user_agent = config.user_agent().map(str::to_string);
        }
        if stream.proxy_url.is_none() {
            stream.proxy_url = config.proxy_url().map(str::to_string);
        }

        KciClient {
            transport: Arc::new(SigningTransport::new(config.credential(), transport)),
            streams: StreamConsumer::new(stream),
            config: Arc::new(config),
        }
    }

    /// GET `path` and decode the JSON answer.
    pub async fn get<O>(&self, path: &str, cancel: &CancellationToken) -> Result<O>
    where
        O: DeserializeOwned,
    {
        let body = self.execute(Method::GET, path, Body::Empty, None, cancel).await?;
        decode(&body)
    }

    /// POST `input` as JSON and decode the JSON answer.
    pub async fn post<I, O>(&self, path: &str, input: &I, cancel: &CancellationToken) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.json_call(Method::POST, path, input, cancel).await
    }

    /// PUT `input` as JSON and decode the JSON answer.
    pub async fn put<I, O>(&self, path: &str, input: &I, cancel: &CancellationToken) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.json_call(Method::PUT, path, input, cancel).await
    }

    /// PATCH `input` as JSON and decode the JSON answer.
    pub async fn patch<I, O>(&self, path: &str, input: &I, cancel: &CancellationToken) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.json_call(Method::PATCH, path, input, cancel).await
    }

    /// DELETE `path`. The answer body is discarded.
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        self.execute(Method::DELETE, path, Body::Empty, None, cancel)
            .await
            .map(drop)
    }

    /// Send a raw body with its content type and return the raw answer.
    ///
    /// A file-backed [`Body`] is read once for the signature and once more
    /// for the wire. `application/octet-stream` bodies are sent but not
    /// signed.
    pub async fn send_body(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.execute(method, path, body, Some(content_type), cancel)
            .await
    }

    /// Build, sign and send one request, mapping the status to a result.
    ///
    /// # Errors
    ///
    /// [`KciError::Status`] with the raw body as message when the status is
    /// outside `200..=206`; otherwise whatever signing or transport reported.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let url = join_url(&self.config.base_url, path);
        let mut builder = Request::builder().method(method.clone()).uri(&url);
        if let Some(user_agent) = self.config.user_agent() {
            builder = builder.header(USER_AGENT, user_agent);
        }
        if let Some(content_type) = content_type.filter(|ct| !ct.is_empty()) {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let mut request = builder.body(body)?;
        // Sign the Host that goes on the wire, port included.
        if let Some(host) = request
            .uri()
            .authority()
            .and_then(|authority| authority.as_str().rsplit('@').next())
        {
            let host = HeaderValue::from_str(host)?;
            request.headers_mut().insert(HOST, host);
        }

        if self.config.enable_logging {
            debug!(%method, %url, "Sending request");
        }

        let response = self.transport.execute(request, cancel).await?;
        let status = response.status().as_u16();
        let body = response.into_body();

        if !is_success_status(status) {
            let message = String::from_utf8_lossy(&body).into_owned();
            if self.config.enable_logging {
                warn!(%method, %url, status, "Request rejected by server");
            }
            return Err(KciError::Status { status, message });
        }

        if self.config.enable_logging {
            debug!(%method, %url, status, bytes = body.len(), "Request completed");
        }
        Ok(body)
    }

    /// Open the account-level build feed of `user_id`.
    pub async fn feed_stream(
        &self,
        user_id: u64,
        cancel: &CancellationToken,
    ) -> Result<MessageStream> {
        self.open_stream(&paths::feed(user_id), cancel).await
    }

    /// Open the live log of one job of one build.
    pub async fn log_stream(
        &self,
        project_id: i64,
        build_number: u32,
        job_number: u32,
        cancel: &CancellationToken,
    ) -> Result<MessageStream> {
        self.open_stream(&paths::live_log(project_id, build_number, job_number), cancel)
            .await
    }

    /// Open a stream at `path` under the stream base URL.
    pub async fn open_stream(&self, path: &str, cancel: &CancellationToken) -> Result<MessageStream> {
        let uri = join_url(&self.config.stream_base_url, path);
        self.streams.open(&uri, HeaderMap::new(), cancel).await
    }

    async fn json_call<I, O>(
        &self,
        method: Method,
        path: &str,
        input: &I,
        cancel: &CancellationToken,
    ) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let encoded = serde_json::to_vec(input).map_err(KciError::Encode)?;
        let body = self
            .execute(method, path, Body::from(encoded), Some(JSON_CONTENT_TYPE), cancel)
            .await?;
        decode(&body)
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The signing transport every request goes through.
    pub fn transport(&self) -> &SigningTransport<T> {
        &self.transport
    }

    /// The stream consumer behind the stream endpoints.
    pub fn streams(&self) -> &StreamConsumer {
        &self.streams
    }
}

fn decode<O: DeserializeOwned>(body: &[u8]) -> Result<O> {
    serde_json::from_slice(body).map_err(KciError::Decode)
}
