//! Wire-level constants and header helpers shared by the signer, the HTTP
//! executor and the stream consumer.
//!
//! | Item | Value |
//! |------|-------|
//! | Signature scheme tag | `Qiniu` |
//! | Vendor header prefix | `X-Qiniu-` |
//! | Unsigned body type | `application/octet-stream` |
//! | Success range | `200..=206` |
//! | Feed stream | `/ws/feed/{user}` |
//! | Log stream | `/ws/log/{project}/{build}/{job}` |

mod headers;

pub use headers::{canonical_header_key, header_str, is_vendor_header, vendor_headers};

/// Protocol constants.
pub mod constants {
    use std::time::Duration;

    /// Tag that opens the `Authorization` value.
    pub const SCHEME_TAG: &str = "Qiniu";

    /// Case-sensitive prefix of headers covered by the signature, in
    /// canonical MIME form.
    pub const VENDOR_HEADER_PREFIX: &str = "X-Qiniu-";

    /// Content type whose bodies are never signed.
    pub const OCTET_STREAM: &str = "application/octet-stream";

    /// Content type of JSON request bodies.
    pub const JSON_CONTENT_TYPE: &str = "application/json";

    /// Highest status code treated as success (206 Partial Content).
    pub const LAST_SUCCESS_STATUS: u16 = 206;

    /// Scheme prefixes used to derive base URLs from a bare host.
    pub const HTTP_SCHEME: &str = "https://";
    /// Websocket counterpart of [`HTTP_SCHEME`].
    pub const WS_SCHEME: &str = "wss://";

    /// Queue capacity of an open message stream.
    pub const STREAM_QUEUE_CAPACITY: usize = 10;
    /// Period between keep-alive pings.
    pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);
    /// Write deadline applied to each keep-alive ping.
    pub const KEEP_ALIVE_WRITE_DEADLINE: Duration = Duration::from_secs(10);

    /// Stream endpoint paths.
    pub mod paths {
        /// Account-level build feed.
        pub fn feed(user_id: u64) -> String {
            format!("/ws/feed/{user_id}")
        }

        /// Live log of one job of one build.
        pub fn live_log(project_id: i64, build_number: u32, job_number: u32) -> String {
            format!("/ws/log/{project_id}/{build_number}/{job_number}")
        }
    }
}

/// Whether a status code counts as success.
///
/// ```
/// use kci_client::protocol::is_success_status;
///
/// assert!(is_success_status(200));
/// assert!(is_success_status(206));
/// assert!(!is_success_status(207));
/// assert!(!is_success_status(404));
/// ```
pub fn is_success_status(status: u16) -> bool {
    (200..=constants::LAST_SUCCESS_STATUS).contains(&status)
}
