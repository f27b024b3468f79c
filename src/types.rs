//! Shared request types.
//!
//! [`Body`] is the rewindable byte source behind every outbound request. The
//! signer reads it to build the canonical request and the transport reads it
//! again to put it on the wire, so it must be loadable more than once without
//! being consumed.

use bytes::Bytes;
use std::path::{Path, PathBuf};

/// A single payload delivered by a message stream.
///
/// The client does not interpret it; build feed and log frames carry JSON.
pub type StreamMessage = Bytes;

/// Rewindable request body.
///
/// Every call to [`Body::load`] starts from the beginning of the source.
///
/// # Examples
///
/// ```
/// use kci_client::Body;
///
/// let body = Body::from(r#"{"name":"demo"}"#);
/// assert_eq!(body.content_length(), 15);
/// assert!(body.is_present());
/// assert!(!Body::empty().is_present());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// In-memory bytes. Cloning is cheap.
    Bytes(Bytes),
    /// A file read from disk on every load.
    File {
        /// Location of the file.
        path: PathBuf,
        /// Length declared when the body was created.
        len: u64,
    },
}

impl Body {
    /// An absent body.
    pub fn empty() -> Self {
        Body::Empty
    }

    /// A body backed by a file. The declared length is taken from the file's
    /// metadata now; the content is read lazily on each load.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(Body::File { path, len })
    }

    /// Whether a body source exists, regardless of its length.
    pub fn is_present(&self) -> bool {
        !matches!(self, Body::Empty)
    }

    /// Declared length in bytes.
    pub fn content_length(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    /// Read the whole body from its start.
    pub async fn load(&self) -> std::io::Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(bytes) => Ok(bytes.clone()),
            Body::File { path, .. } => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}
