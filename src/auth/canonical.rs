//! Canonical request construction.
//!
//! The canonical request is the exact byte sequence fed to the HMAC:
//!
//! ```text
//! METHOD SP PATH [ "?" QUERY ]
//! "Host: " HOST
//! [ "Content-Type: " CONTENT-TYPE ]
//! [ NAME ": " VALUE ]...        (vendor headers, sorted by name)
//! <empty line>
//! [ BODY ]
//! ```
//!
//! PATH is the percent-decoded path while QUERY stays exactly as sent.
//! Lines are joined with `\n`. The body is appended only when
//! [`includes_body`] says so; large opaque uploads sent as
//! `application/octet-stream` stay out of the signature.

use crate::error::{KciError, Result};
use crate::protocol::{self, constants::OCTET_STREAM};
use crate::types::Body;
use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderMap, Request};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Build the canonical bytes of a request.
///
/// The body is loaded through its rewindable source and left untouched, so the
/// transport can still send it afterwards.
///
/// # Errors
///
/// [`KciError::Signing`] when the body has to be signed but cannot be read.
pub async fn canonicalize(request: &Request<Body>) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(256);
    write_header_section(&mut buf, request);

    let body = request.body();
    let content_type = content_type(request.headers());
    if includes_body(body.content_length(), body.is_present(), content_type) {
        let bytes = body.load().await.map_err(KciError::Signing)?;
        buf.put_slice(&bytes);
    }

    Ok(buf.freeze())
}

/// Whether the body takes part in the signature.
///
/// All four conditions must hold: a non-zero declared length, a body source,
/// a non-empty content type, and a content type other than
/// `application/octet-stream`.
///
/// ```
/// use kci_client::auth::includes_body;
///
/// assert!(includes_body(4, true, b"application/json"));
/// assert!(!includes_body(0, true, b"application/json"));
/// assert!(!includes_body(4, false, b"application/json"));
/// assert!(!includes_body(4, true, b""));
/// assert!(!includes_body(4, true, b"application/octet-stream"));
/// ```
pub fn includes_body(content_length: u64, body_present: bool, content_type: &[u8]) -> bool {
    content_length != 0
        && body_present
        && !content_type.is_empty()
        && content_type != OCTET_STREAM.as_bytes()
}

/// Raw `Content-Type` bytes, empty when the header is missing.
fn content_type(headers: &HeaderMap) -> &[u8] {
    headers
        .get(CONTENT_TYPE)
        .map(|value| value.as_bytes())
        .unwrap_or(b"")
}

/// Everything up to and including the blank line.
fn write_header_section(buf: &mut BytesMut, request: &Request<Body>) {
    let uri = request.uri();
    buf.put_slice(request.method().as_str().as_bytes());
    buf.put_u8(b' ');
    let path: Cow<'_, [u8]> = percent_decode_str(uri.path()).into();
    buf.put_slice(&path);
    if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
        buf.put_u8(b'?');
        buf.put_slice(query.as_bytes());
    }

    buf.put_slice(b"\nHost: ");
    buf.put_slice(request_host(request).as_bytes());

    let content_type = content_type(request.headers());
    if !content_type.is_empty() {
        buf.put_slice(b"\nContent-Type: ");
        buf.put_slice(content_type);
    }

    for (name, value) in protocol::vendor_headers(request.headers()) {
        buf.put_u8(b'\n');
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
    }

    buf.put_slice(b"\n\n");
}

/// Explicit `Host` header when set, otherwise the URI authority without
/// userinfo.
fn request_host(request: &Request<Body>) -> &str {
    if let Some(host) = protocol::header_str(request.headers(), HOST) {
        return host;
    }
    request
        .uri()
        .authority()
        .and_then(|authority| authority.as_str().rsplit('@').next())
        .unwrap_or("")
}
