//! Header name normalization and vendor header selection.
//!
//! The `http` crate stores header names in lower case, while the service
//! signs them in canonical MIME form (`X-Qiniu-Meta`). Selection and
//! ordering therefore happen on the canonical form.
//!
//! # Examples
//!
//! ```
//! use kci_client::protocol::{canonical_header_key, is_vendor_header};
//!
//! assert_eq!(canonical_header_key("x-qiniu-meta-key"), "X-Qiniu-Meta-Key");
//! assert!(is_vendor_header("X-Qiniu-Meta"));
//! assert!(!is_vendor_header("X-Qiniu-"));
//! assert!(!is_vendor_header("X-Other"));
//! ```

use super::constants::VENDOR_HEADER_PREFIX;
use http::{HeaderMap, HeaderValue};
use std::collections::BTreeMap;

/// Convert a header name to canonical MIME form: the first letter and every
/// letter following a hyphen upper-cased, the rest lower-cased.
///
/// Names containing bytes outside the token set are returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Whether a canonical header name is covered by the signature.
///
/// The prefix alone does not qualify; the name must be strictly longer.
#[inline]
pub fn is_vendor_header(canonical_name: &str) -> bool {
    canonical_name.len() > VENDOR_HEADER_PREFIX.len()
        && canonical_name.starts_with(VENDOR_HEADER_PREFIX)
}

/// Collect the vendor headers of a request, keyed and sorted by canonical
/// name. Only the first value of a repeated header is kept.
pub fn vendor_headers(headers: &HeaderMap) -> BTreeMap<String, &HeaderValue> {
    headers
        .keys()
        .filter_map(|name| {
            let canonical = canonical_header_key(name.as_str());
            if !is_vendor_header(&canonical) {
                return None;
            }
            headers.get(name).map(|value| (canonical, value))
        })
        .collect()
}

/// First value of a header as text, or `None` when absent or not visible
/// ASCII.
pub fn header_str<'a>(headers: &'a HeaderMap, name: impl http::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
