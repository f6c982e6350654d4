//! The artifact model: captured HTTP responses and their identity.

use crate::digest::ContentDigest;
use crate::error::{CoreError, CoreResult};
use crate::locator::StorageLocator;
use crate::types::{ArtifactId, ArtifactIdentifier};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::io::Read;

/// The status line of a captured HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatus {
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Status code.
    pub code: u16,
    /// Reason phrase, possibly empty.
    pub reason: String,
}

impl HttpStatus {
    /// Returns true for 3xx codes.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}

/// Ordered HTTP header fields with case-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpHeaders(Vec<(String, String)>);

impl HttpHeaders {
    /// Returns the first value for `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over all fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed HTTP response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHead {
    /// The status line.
    pub status: HttpStatus,
    /// The header fields.
    pub headers: HttpHeaders,
    /// Bytes occupied by the head, terminator included.
    pub len: usize,
}

/// Returns the length of the head at the start of `data`, through the
/// `CR LF CR LF` terminator, if the terminator is present.
#[must_use]
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4)
}

/// Parses the HTTP response head at the start of `data`.
///
/// Header values are decoded leniently: bytes that are not UTF-8 are
/// replaced rather than rejected. Folded continuation lines are joined to
/// the previous value.
///
/// # Errors
///
/// Returns `InvalidHttpResponse` if there is no terminator, the status
/// line is malformed, or a header line has no `:`.
pub fn parse_http_head(data: &[u8]) -> CoreResult<HttpHead> {
    let len = find_head_end(data)
        .ok_or_else(|| CoreError::invalid_http("response head is not terminated"))?;
    let text = String::from_utf8_lossy(&data[..len - 4]);
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(CoreError::invalid_http(format!(
            "bad status line {status_line:?}"
        )));
    }
    let code = parts
        .next()
        .filter(|c| c.len() == 3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| CoreError::invalid_http(format!("bad status code in {status_line:?}")))?;
    let reason = parts.next().unwrap_or_default().trim();

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_http(format!("bad header line {line:?}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(HttpHead {
        status: HttpStatus {
            version: version.to_string(),
            code,
            reason: reason.to_string(),
        },
        headers: HttpHeaders(headers),
        len,
    })
}

/// One immutable, versioned capture of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Unique id assigned at ingestion.
    pub id: ArtifactId,
    /// Collection, AU, URI and version.
    pub identifier: ArtifactIdentifier,
    /// HTTP status line.
    pub status: HttpStatus,
    /// HTTP response headers.
    pub headers: HttpHeaders,
    /// Length of the HTTP body in bytes.
    pub content_length: u64,
    /// Digest of the HTTP body.
    pub content_digest: ContentDigest,
    /// Where the artifact record is stored.
    pub locator: StorageLocator,
    /// When the resource was captured, to the millisecond.
    pub capture_time: DateTime<Utc>,
    /// Whether the artifact is visible to readers.
    pub committed: bool,
}

impl Artifact {
    /// Returns the MIME type from `Content-Type`, without parameters.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.headers
            .get("Content-Type")
            .map(|v| v.split(';').next().unwrap_or_default().trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the `Location` header of a redirect response.
    #[must_use]
    pub fn redirect_location(&self) -> Option<&str> {
        if self.status.is_redirect() {
            self.headers.get("Location")
        } else {
            None
        }
    }
}

/// An artifact together with its HTTP body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactData {
    /// The artifact.
    pub artifact: Artifact,
    /// The HTTP body.
    pub body: Bytes,
}

/// Everything needed to ingest a capture.
///
/// `content` yields the raw HTTP response: status line, headers, blank
/// line and body.
pub struct ArtifactSpec<R> {
    /// Target collection.
    pub collection: String,
    /// Target archival unit.
    pub au_id: String,
    /// Captured URI.
    pub uri: String,
    /// Version the caller expects. Versions are always assigned by the
    /// store; a hint is only compared and logged.
    pub version_hint: Option<u32>,
    /// Capture time; the ingestion time when absent.
    pub capture_time: Option<DateTime<Utc>>,
    /// Raw HTTP response bytes.
    pub content: R,
}

impl<R: Read> ArtifactSpec<R> {
    /// Creates a spec. Fields are validated at ingestion.
    pub fn new(
        collection: impl Into<String>,
        au_id: impl Into<String>,
        uri: impl Into<String>,
        content: R,
    ) -> Self {
        Self {
            collection: collection.into(),
            au_id: au_id.into(),
            uri: uri.into(),
            version_hint: None,
            capture_time: None,
            content,
        }
    }

    /// Sets the version hint.
    #[must_use]
    pub fn version_hint(mut self, version: u32) -> Self {
        self.version_hint = Some(version);
        self
    }

    /// Sets the capture time. Sub-millisecond precision is dropped.
    #[must_use]
    pub fn capture_time(mut self, time: DateTime<Utc>) -> Self {
        self.capture_time = Some(time.trunc_subsecs(3));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_headers() {
        let data: &[u8] = b"HTTP/1.1 301 Moved Permanently\r\nLocation: http://b/\r\nContent-Type: text/html; charset=utf-8\r\n\r\nbody";
        let head = parse_http_head(data).unwrap();
        assert_eq!(head.status.version, "HTTP/1.1");
        assert_eq!(head.status.code, 301);
        assert_eq!(head.status.reason, "Moved Permanently");
        assert!(head.status.is_redirect());
        assert_eq!(head.headers.get("location"), Some("http://b/"));
        assert_eq!(head.headers.len(), 2);
        assert_eq!(head.len, data.len() - 4);
    }

    #[test]
    fn empty_reason_and_folded_header() {
        let head = parse_http_head(b"HTTP/1.0 200\r\nX-Long: a\r\n  b\r\n\r\n").unwrap();
        assert_eq!(head.status.reason, "");
        assert_eq!(head.headers.get("x-long"), Some("a b"));
    }

    #[test]
    fn rejects_bad_heads() {
        for bad in [
            &b"HTTP/1.1 200 OK\r\n"[..],
            b"GET / HTTP/1.1\r\n\r\n",
            b"HTTP/1.1 2000 OK\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nno colon here\r\n\r\n",
        ] {
            assert!(matches!(
                parse_http_head(bad),
                Err(CoreError::InvalidHttpResponse { .. })
            ));
        }
    }

    #[test]
    fn head_end() {
        assert_eq!(find_head_end(b"HTTP/1.1 200 OK\r\n\r\nBODY"), Some(19));
        assert_eq!(find_head_end(b"HTTP/1.1 200 OK\r\n"), None);
    }
}
