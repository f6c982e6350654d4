//! Payload digests and the ingest digest filter.
//!
//! Captured HTTP responses arrive as one byte stream: a header block ended
//! by `CR LF CR LF`, then the body. [`DigestFilter`] sits on that stream,
//! passes the header block through to an inner writer untouched and feeds
//! every later byte to a hash, so the body digest is known as soon as the
//! stream ends without the body ever being held in memory.
//!
//! ## Terminator detection
//!
//! | State | CR | LF | other |
//! |---|---|---|---|
//! | 0 | 1 | 0 | 0 |
//! | 1 | 1 | 2 | 0 |
//! | 2 | 3 | 0 | 0 |
//! | 3 | 1 | switch | 0 |
//!
//! The switch happens once. The state is kept across `write` calls, so a
//! terminator split over any number of writes is still found.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// The hash algorithm used for payload digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-224.
    Sha224,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the label used in rendered digests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha224 => "sha224",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Parses an algorithm name such as `SHA-256` or `sha256`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDigestAlgorithm` for unknown names.
    pub fn from_name(name: &str) -> CoreResult<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha224" => Ok(Self::Sha224),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(CoreError::UnsupportedDigestAlgorithm {
                name: name.to_string(),
            }),
        }
    }

    fn hasher(self) -> Hasher {
        match self {
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
            Self::Sha224 => Hasher::Sha224(Sha224::new()),
            Self::Sha384 => Hasher::Sha384(Sha384::new()),
            Self::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha224(Sha224),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => to_hex(&h.finalize()),
            Self::Sha224(h) => to_hex(&h.finalize()),
            Self::Sha384(h) => to_hex(&h.finalize()),
            Self::Sha512(h) => to_hex(&h.finalize()),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A digest with its algorithm tag, rendered as `<algorithm>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex digest value.
    pub hex: String,
}

impl ContentDigest {
    /// Computes the digest of `data` in one step.
    #[must_use]
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        Self {
            algorithm,
            hex: hasher.finalize_hex(),
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_record(format!("malformed digest {s:?}")))?;
        let algorithm = DigestAlgorithm::from_name(algorithm)?;
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::invalid_record(format!("malformed digest {s:?}")));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }
}

/// A write filter that passes an HTTP header block through and digests
/// everything after it.
///
/// # Example
///
/// ```rust
/// use arcvault_core::{DigestAlgorithm, DigestFilter};
/// use std::io::Write;
///
/// let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
/// filter.write_all(b"HTTP/1.1 200 OK\r\n\r\nBODY").unwrap();
/// let (head, digest) = filter.finish();
/// assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n");
/// assert!(digest.to_string().starts_with("sha256:"));
/// ```
pub struct DigestFilter<W> {
    inner: W,
    hasher: Hasher,
    algorithm: DigestAlgorithm,
    state: u8,
    in_payload: bool,
    header_len: u64,
    payload_len: u64,
}

impl<W: Write> DigestFilter<W> {
    /// Creates a filter passing header bytes to `inner`.
    pub fn new(inner: W, algorithm: DigestAlgorithm) -> Self {
        Self {
            inner,
            hasher: algorithm.hasher(),
            algorithm,
            state: 0,
            in_payload: false,
            header_len: 0,
            payload_len: 0,
        }
    }

    /// Creates a filter for an algorithm given by name.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDigestAlgorithm` for unknown names.
    pub fn with_algorithm_name(inner: W, name: &str) -> CoreResult<Self> {
        Ok(Self::new(inner, DigestAlgorithm::from_name(name)?))
    }

    /// Returns true once the header terminator has been seen.
    #[must_use]
    pub fn is_in_payload(&self) -> bool {
        self.in_payload
    }

    /// Returns the number of bytes passed through, terminator included.
    #[must_use]
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Returns the number of bytes digested.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Returns the inner writer and the payload digest.
    pub fn finish(self) -> (W, ContentDigest) {
        let digest = ContentDigest {
            algorithm: self.algorithm,
            hex: self.hasher.finalize_hex(),
        };
        (self.inner, digest)
    }

    /// Advances the terminator state over `buf`, returning the length of
    /// the header part if the terminator completes inside it.
    fn scan(&mut self, buf: &[u8]) -> Option<usize> {
        for (i, &b) in buf.iter().enumerate() {
            self.state = match (self.state, b) {
                (3, b'\n') => return Some(i + 1),
                (_, b'\r') if self.state != 2 => 1,
                (2, b'\r') => 3,
                (1, b'\n') => 2,
                _ => 0,
            };
        }
        None
    }

    fn digest(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.payload_len += data.len() as u64;
    }
}

impl<W: Write> Write for DigestFilter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.in_payload {
            self.digest(buf);
            return Ok(buf.len());
        }

        match self.scan(buf) {
            Some(split) => {
                self.inner.write_all(&buf[..split])?;
                self.header_len += split as u64;
                self.in_payload = true;
                self.digest(&buf[split..]);
            }
            None => {
                self.inner.write_all(buf)?;
                self.header_len += buf.len() as u64;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\r\nBODY";

    fn body_digest() -> ContentDigest {
        ContentDigest::compute(DigestAlgorithm::Sha256, b"BODY")
    }

    #[test]
    fn single_write() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(RESPONSE).unwrap();
        assert!(filter.is_in_payload());
        assert_eq!(filter.header_len(), 19);
        assert_eq!(filter.payload_len(), 4);

        let (head, digest) = filter.finish();
        assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(digest, body_digest());
    }

    #[test]
    fn byte_at_a_time() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        for b in RESPONSE {
            filter.write_all(&[*b]).unwrap();
        }
        let (head, digest) = filter.finish();
        assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(digest, body_digest());
    }

    #[test]
    fn empty_body_has_known_digest() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
        assert!(filter.is_in_payload());
        let (_, digest) = filter.finish();
        assert_eq!(
            digest.to_string(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn no_terminator_stays_in_header() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(b"HTTP/1.1 200 OK\r\n\r").unwrap();
        assert!(!filter.is_in_payload());
        assert_eq!(filter.payload_len(), 0);
    }

    #[test]
    fn bare_newlines_do_not_terminate() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(b"HTTP/1.1 200 OK\n\nstill header").unwrap();
        assert!(!filter.is_in_payload());
    }

    #[test]
    fn cr_cr_lf_restarts_match() {
        // CR CR LF CR LF: the second CR restarts the match at state 1.
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(b"X\r\r\n\r\nBODY").unwrap();
        assert!(filter.is_in_payload());
        let (head, digest) = filter.finish();
        assert_eq!(head, b"X\r\r\n\r\n");
        assert_eq!(digest, body_digest());
    }

    #[test]
    fn terminator_bytes_in_payload_are_digested() {
        let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
        filter.write_all(b"H\r\n\r\nA\r\n\r\nB").unwrap();
        let (head, digest) = filter.finish();
        assert_eq!(head, b"H\r\n\r\n");
        assert_eq!(digest, ContentDigest::compute(DigestAlgorithm::Sha256, b"A\r\n\r\nB"));
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(DigestAlgorithm::from_name("SHA-256").unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::from_name("sha256").unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::from_name("SHA-512").unwrap(), DigestAlgorithm::Sha512);
        assert_eq!(DigestAlgorithm::from_name("sha_384").unwrap(), DigestAlgorithm::Sha384);
        assert!(matches!(
            DigestAlgorithm::from_name("MD5"),
            Err(CoreError::UnsupportedDigestAlgorithm { .. })
        ));
        assert!(DigestFilter::with_algorithm_name(Vec::new(), "crc32").is_err());
    }

    #[test]
    fn digest_text_roundtrip() {
        let digest = ContentDigest::compute(DigestAlgorithm::Sha512, b"x");
        let text = digest.to_string();
        assert!(text.starts_with("sha512:"));
        assert_eq!(text.parse::<ContentDigest>().unwrap(), digest);
        assert!("sha256".parse::<ContentDigest>().is_err());
        assert!("sha256:xyz".parse::<ContentDigest>().is_err());
    }

    proptest! {
        #[test]
        fn any_split_yields_same_digest(cuts in prop::collection::vec(0usize..=23, 0..8)) {
            let mut cuts = cuts;
            cuts.push(0);
            cuts.push(RESPONSE.len());
            cuts.sort_unstable();

            let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
            for pair in cuts.windows(2) {
                filter.write_all(&RESPONSE[pair[0]..pair[1]]).unwrap();
            }
            let (head, digest) = filter.finish();
            prop_assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n".to_vec());
            prop_assert_eq!(digest, body_digest());
        }
    }
}
