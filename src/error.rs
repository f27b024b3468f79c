//! Error types for the KCI client.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is
//! [`KciError`]. The variants keep the failure classes apart so callers can
//! tell a request that never left the process (signing) from one the network
//! refused (transport), one the server rejected (status) and one whose
//! successful body did not have the expected shape (decode).
//!
//! Nothing in the crate retries. Recovery policy belongs to the caller.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KciError>;

/// Errors produced by the KCI client.
#[derive(Debug, Error)]
pub enum KciError {
    /// The canonical request could not be built, usually because the body
    /// could not be read. Raised before any network I/O.
    #[error("failed to sign request: {0}")]
    Signing(#[source] std::io::Error),

    /// DNS, connect, TLS or protocol failure from the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status. The message is the
    /// raw response body, verbatim.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// A success response whose body did not match the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request input could not be encoded as JSON.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The websocket handshake or framing failed.
    #[error("stream error: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),

    /// The proxy refused or mangled the `CONNECT` tunnel.
    #[error("proxy error: {0}")]
    Proxy(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Local I/O failure outside of signing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KciError {
    /// Status code carried by a [`KciError::Status`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            KciError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the request with a non-success status.
    pub fn is_status(&self) -> bool {
        matches!(self, KciError::Status { .. })
    }

    /// Whether the failure happened before the request reached the network.
    pub fn is_signing(&self) -> bool {
        matches!(self, KciError::Signing(_))
    }

    /// Whether the failure is a decode failure of a success response.
    pub fn is_decode(&self) -> bool {
        matches!(self, KciError::Decode(_))
    }
}

impl From<http::Error> for KciError {
    fn from(err: http::Error) -> Self {
        KciError::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for KciError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        KciError::InvalidHeader(err.to_string())
    }
}
