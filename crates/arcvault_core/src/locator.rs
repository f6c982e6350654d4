//! Storage locators.
//!
//! A locator names the exact bytes of one record:
//!
//! ```text
//! volatile:///collections/web/au-0123456789abcdef/artifacts.warc?offset=0&length=512
//! file:///collections/web/au-0123456789abcdef/artifacts.warc?offset=512&length=230
//! ```
//!
//! The path is relative to the volume that issued the locator. Once
//! issued a locator never changes, and reading it needs no coordination
//! with writers.

use crate::error::{CoreError, CoreResult};
use crate::store::LogName;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Identifies which kind of volume issued a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorScheme {
    /// An in-memory volume.
    Volatile,
    /// A directory volume.
    File,
}

impl LocatorScheme {
    /// Returns the URL scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Volatile => "volatile",
            Self::File => "file",
        }
    }
}

impl fmt::Display for LocatorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The physical address of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocator {
    scheme: LocatorScheme,
    log: LogName,
    offset: u64,
    length: u64,
}

impl StorageLocator {
    /// Creates a locator.
    #[must_use]
    pub fn new(scheme: LocatorScheme, log: LogName, offset: u64, length: u64) -> Self {
        Self {
            scheme,
            log,
            offset,
            length,
        }
    }

    /// Returns the issuing volume kind.
    #[must_use]
    pub fn scheme(&self) -> LocatorScheme {
        self.scheme
    }

    /// Returns the log holding the record.
    #[must_use]
    pub fn log(&self) -> &LogName {
        &self.log
    }

    /// Returns the record's byte offset in its log.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the record's total length in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Parses a locator string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLocator` if the string is not a well-formed locator.
    pub fn parse(s: &str) -> CoreResult<Self> {
        let url = Url::parse(s).map_err(|e| CoreError::invalid_locator(s, e.to_string()))?;

        let scheme = match url.scheme() {
            "volatile" => LocatorScheme::Volatile,
            "file" => LocatorScheme::File,
            other => {
                return Err(CoreError::invalid_locator(
                    s,
                    format!("unknown scheme {other:?}"),
                ))
            }
        };
        if url.host_str().is_some_and(|h| !h.is_empty()) {
            return Err(CoreError::invalid_locator(s, "locators carry no host"));
        }

        let path = url
            .path()
            .strip_prefix('/')
            .ok_or_else(|| CoreError::invalid_locator(s, "missing log path"))?;
        let path = percent_decode(path).ok_or_else(|| CoreError::invalid_locator(s, "bad escape"))?;
        let log = LogName::parse(&path).map_err(|e| CoreError::invalid_locator(s, e.to_string()))?;

        let mut offset = None;
        let mut length = None;
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "offset" => &mut offset,
                "length" => &mut length,
                _ => continue,
            };
            let parsed = value
                .parse::<u64>()
                .map_err(|_| CoreError::invalid_locator(s, format!("bad {key} {value:?}")))?;
            *slot = Some(parsed);
        }

        Ok(Self {
            scheme,
            log,
            offset: offset.ok_or_else(|| CoreError::invalid_locator(s, "missing offset"))?,
            length: length.ok_or_else(|| CoreError::invalid_locator(s, "missing length"))?,
        })
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:///{}?offset={}&length={}",
            self.scheme,
            percent_encode(self.log.as_str()),
            self.offset,
            self.length
        )
    }
}

impl FromStr for StorageLocator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn percent_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn percent_decode(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(collection: &str) -> LogName {
        LogName::for_au(collection, "au-1").unwrap()
    }

    #[test]
    fn display_parse_roundtrip() {
        for scheme in [LocatorScheme::Volatile, LocatorScheme::File] {
            let locator = StorageLocator::new(scheme, log("web"), 1024, 377);
            let text = locator.to_string();
            assert!(text.starts_with(&format!("{scheme}:///collections/web/")));
            assert!(text.ends_with("?offset=1024&length=377"));
            assert_eq!(StorageLocator::parse(&text).unwrap(), locator);
        }
    }

    #[test]
    fn unusual_collection_names_roundtrip() {
        let locator = StorageLocator::new(LocatorScheme::File, log("my coll?#%+é"), 0, 1);
        let parsed: StorageLocator = locator.to_string().parse().unwrap();
        assert_eq!(parsed.log().collection(), "my coll?#%+é");
        assert_eq!(parsed, locator);
    }

    #[test]
    fn rejects_malformed_locators() {
        let good = StorageLocator::new(LocatorScheme::Volatile, log("web"), 0, 1).to_string();
        for bad in [
            "",
            "not a url",
            &good.replace("volatile", "http"),
            &good.replace("offset=0&", ""),
            &good.replace("length=1", "length=-1"),
            &good.replace("artifacts.warc", "other.bin"),
        ] {
            assert!(
                matches!(StorageLocator::parse(bad), Err(CoreError::InvalidLocator { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
