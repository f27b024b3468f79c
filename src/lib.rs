#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # kci-client: signed requests and message streams for KCI
//!
//! ## Overview
//!
//! The crate provides two primitives and the plumbing around them:
//!
//! 1. **An authenticated request executor.** Every HTTP request is signed on
//!    its own: the method, path, query, host, content type, vendor headers
//!    and (usually) body are written into a canonical byte sequence, keyed
//!    with the secret through HMAC-SHA1 and sent as
//!    `Authorization: Qiniu <access_key>:<signature>`.
//! 2. **An open message stream.** A persistent websocket becomes an ordered,
//!    bounded channel of byte payloads, kept alive by periodic pings and
//!    closed exactly once whatever ends it.
//!
//! Nothing is retried, and every call and stream takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ## Client Usage
//!
//! ```ignore
//! use kci_client::KciClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KciClient::new("kci.example.com", "AK", "SK")?;
//!     let cancel = CancellationToken::new();
//!
//!     let user: serde_json::Value = client.get("/v1/user", &cancel).await?;
//!     println!("{user}");
//!
//!     let mut feed = client.feed_stream(42, &cancel).await?;
//!     while let Some(event) = feed.next().await {
//!         println!("{}", String::from_utf8_lossy(&event));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Signing Without the Client
//!
//! ```ignore
//! use kci_client::{Credential, ReqwestTransport, SigningTransport};
//!
//! let transport = SigningTransport::new(
//!     Credential::new("AK", "SK"),
//!     ReqwestTransport::new(reqwest::Client::new()),
//! );
//! let response = transport.execute(request, &cancel).await?;
//! ```
//!
//! ## Module Structure
//!
//! - **[auth]** - Credentials, canonical request, HMAC-SHA1 signer
//! - **[client]** - Transports, the signing executor, streams and `KciClient`
//! - **[error]** - Error types and result handling
//! - **[protocol]** - Wire constants, success range, stream paths, header helpers
//! - **[types]** - Rewindable request bodies and stream payloads

pub mod auth;
pub mod client;
pub mod error;
pub mod protocol;
pub mod types;

pub use auth::{Credential, Signer};
pub use client::{
    ClientConfig, KciClient, MessageStream, ReqwestTransport, SigningTransport, StreamConfig,
    StreamConsumer, Transport,
};
pub use error::{KciError, Result};
pub use types::{Body, StreamMessage};

#[cfg(test)]
mod tests;
