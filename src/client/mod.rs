//! KCI HTTP and stream client.
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── config    - ClientConfig and StreamConfig
//! ├── fetch     - KciClient: verb helpers and stream endpoints
//! ├── transport - Transport trait and the reqwest-backed default
//! ├── signing   - SigningTransport, the signing executor
//! ├── stream    - StreamConsumer and MessageStream
//! └── utils     - URL helpers and stream proxy rules
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`KciClient`] | Authenticated client with JSON helpers and stream endpoints |
//! | [`ClientConfig`] | Per-instance configuration |
//! | [`Transport`] | One request/response exchange |
//! | [`SigningTransport`] | Signs every request, then delegates |
//! | [`StreamConsumer`] | Dials websocket message streams |
//! | [`MessageStream`] | Ordered, bounded channel of payloads |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use kci_client::client::{ClientConfig, KciClient};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("kci.example.com", "AK", "SK")
//!     .with_request_timeout(Duration::from_secs(30));
//! let client = KciClient::with_config(config).unwrap();
//! assert_eq!(client.config().base_url, "https://kci.example.com");
//! ```
//!
//! ## Proxy Selection for Streams
//!
//! ```
//! use kci_client::client::ProxyRules;
//!
//! let rules = ProxyRules::explicit("http://proxy:3128").unwrap();
//! let uri = "wss://kci.example.com/ws/feed/42".parse().unwrap();
//! assert_eq!(rules.intercept(&uri).unwrap().uri().host(), Some("proxy"));
//! ```

mod config;
mod fetch;
mod signing;
mod stream;
mod transport;
mod utils;

pub use config::{ClientConfig, StreamConfig};
pub use fetch::KciClient;
pub use signing::SigningTransport;
pub use stream::{MessageStream, StreamConsumer};
pub use transport::{ReqwestTransport, Transport};
pub use utils::*;
