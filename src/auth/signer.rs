//! HMAC-SHA1 request signing.
//!
//! The `Authorization` header has the format:
//!
//! ```text
//! Qiniu <AccessKey>:<Signature>
//! ```
//!
//! Where `Signature = Base64Url(HMAC-SHA1(SecretKey, CanonicalRequest))`,
//! padded. See [`canonicalize`](super::canonicalize) for the canonical form.

use super::canonical::canonicalize;
use super::credential::Credential;
use crate::error::{KciError, Result};
use crate::protocol::constants::SCHEME_TAG;
use crate::types::Body;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use sha1::Sha1;
use tracing::trace;

type HmacSha1 = Hmac<Sha1>;

/// Compute `HMAC-SHA1(secret_key, canonical)`.
///
/// # Errors
///
/// Never fails for HMAC keys in practice; the key length error of the
/// underlying API is reported as [`KciError::Signing`].
pub fn compute_digest(secret_key: &[u8], canonical: &[u8]) -> Result<[u8; 20]> {
    let mut mac = HmacSha1::new_from_slice(secret_key).map_err(|e| {
        KciError::Signing(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
    })?;
    mac.update(canonical);
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(digest)
}

/// Format the `Authorization` value for a digest.
///
/// ```
/// use kci_client::auth::header_value;
///
/// let value = header_value("AK", &[0xfb, 0xff]);
/// assert_eq!(value, "Qiniu AK:-_8=");
/// ```
pub fn header_value(access_key: &str, digest: &[u8]) -> String {
    format!("{SCHEME_TAG} {access_key}:{}", URL_SAFE.encode(digest))
}

/// Signs outbound requests with one credential.
///
/// Signing is a pure function of the credential and the request, so a single
/// signer can be shared across concurrent callers without locking.
#[derive(Debug, Clone)]
pub struct Signer {
    credential: Credential,
}

impl Signer {
    /// Create a signer for a credential.
    pub fn new(credential: Credential) -> Self {
        Signer { credential }
    }

    /// The credential this signer uses.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Compute the `Authorization` value for a request without modifying it.
    pub async fn authorization(&self, request: &Request<Body>) -> Result<String> {
        let canonical = canonicalize(request).await?;
        trace!(
            access_key = %self.credential.access_key(),
            method = %request.method(),
            path = request.uri().path(),
            canonical_len = canonical.len(),
            "Built canonical request"
        );
        let digest = compute_digest(self.credential.secret_key(), &canonical)?;
        Ok(header_value(self.credential.access_key(), &digest))
    }

    /// Sign a request in place, overwriting any existing `Authorization`
    /// header.
    pub async fn sign_request(&self, request: &mut Request<Body>) -> Result<()> {
        let value = self.authorization(request).await?;
        let value = HeaderValue::from_str(&value)?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}
