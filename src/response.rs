//! HTTP-shaped responses.
//!
//! [`Response`] is transport-independent: the server layer copies it onto
//! the wire, tests inspect it directly. Every response carries a
//! `Content-Length` computed from its body.
//!
//! Image responses add client caching headers:
//!
//! | Header | Value |
//! |---|---|
//! | `Cache-Control` | `public, max-age={lifetime}` |
//! | `Expires` | now + lifetime |
//! | `Last-Modified` | modification time of the cached thumbnail |
//! | `ETag` | quoted SHA-256 of the body |

use crate::cache::ThumbnailArtifact;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime};

pub const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub status_message: &'static str,
    /// Header names and values in emission order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Reason phrase for a status code. Unknown codes get an empty string.
pub fn status_message(code: u16) -> &'static str {
    match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

impl Response {
    /// Assemble a response. Status defaults to 200; `Content-Length` is
    /// always set from the body and overrides any supplied value.
    pub fn build(status: Option<u16>, body: Vec<u8>, headers: Vec<(String, String)>) -> Self {
        let status_code = status.unwrap_or(200);
        let mut response = Self {
            status_code,
            status_message: status_message(status_code),
            headers,
            body,
        };
        response.set_header("Content-Length", response.body.len().to_string());
        response
    }

    pub fn html(status: u16, body: String) -> Self {
        Self::build(
            Some(status),
            body.into_bytes(),
            vec![("Content-Type".to_string(), HTML.to_string())],
        )
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace a header in place, or append it.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }
}

/// Format a timestamp as an HTTP date: `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Strong validator for a body.
pub fn etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}

/// 200 response for a thumbnail with long-lived caching headers.
pub fn image_response(artifact: &ThumbnailArtifact, lifetime: Duration, now: SystemTime) -> Response {
    let headers = vec![
        ("Content-Type".to_string(), artifact.mime().to_string()),
        (
            "Cache-Control".to_string(),
            format!("public, max-age={}", lifetime.as_secs()),
        ),
        ("Expires".to_string(), http_date(now + lifetime)),
        (
            "Last-Modified".to_string(),
            http_date(artifact.last_modified),
        ),
        ("ETag".to_string(), etag(&artifact.bytes)),
    ];
    Response::build(None, artifact.bytes.clone(), headers)
}
