//! Request authentication.
//!
//! Every HTTP call is authenticated on its own, with no prior handshake: the
//! request's signable fields are serialized into a canonical byte sequence,
//! keyed with the secret through HMAC-SHA1, and the result is sent in the
//! `Authorization` header together with the public access key.
//!
//! | Item | Module |
//! |------|--------|
//! | [`Credential`] | `credential` |
//! | [`canonicalize`], [`includes_body`] | `canonical` |
//! | [`Signer`], [`compute_digest`], [`header_value`] | `signer` |
//!
//! # Examples
//!
//! ```
//! use kci_client::auth::{Credential, Signer};
//! use kci_client::Body;
//!
//! # tokio_test::block_on(async {
//! let signer = Signer::new(Credential::new("AK", "SK"));
//! let mut request = http::Request::builder()
//!     .method("GET")
//!     .uri("https://kci.example.com/v1/user")
//!     .body(Body::empty())
//!     .unwrap();
//!
//! signer.sign_request(&mut request).await.unwrap();
//! let auth = request.headers()["authorization"].to_str().unwrap();
//! assert!(auth.starts_with("Qiniu AK:"));
//! # });
//! ```

mod canonical;
mod credential;
mod signer;

pub use canonical::{canonicalize, includes_body};
pub use credential::Credential;
pub use signer::{compute_digest, header_value, Signer};
