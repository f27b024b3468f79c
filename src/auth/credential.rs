//! Access key / secret key pair.

use std::fmt;

/// Credentials used to sign every request of one client.
///
/// Built once when the client is constructed and never mutated. The secret is
/// only ever used as an HMAC key: it is redacted from `Debug` output and the
/// type has no serialization support.
#[derive(Clone)]
pub struct Credential {
    access_key: String,
    secret_key: Vec<u8>,
}

impl Credential {
    /// Create a credential from an access key identifier and a secret key.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Credential {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Empty access key and empty secret. Requests are still signed, so the
    /// server rejects them the same way it rejects any bad signature.
    pub fn anonymous() -> Self {
        Credential::new("", Vec::new())
    }

    /// The public access key identifier.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
