//! Record header block.

use crate::error::{CodecError, CodecResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Line that opens every record. The decoder resynchronises on it.
pub const VERSION_LINE: &[u8] = b"WARC/1.0\r\n";

/// Bytes that follow every payload.
pub const TRAILER: &[u8] = b"\r\n\r\n";

/// Largest header block the decoder accepts.
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Well-known header names.
pub mod names {
    /// Record identifier, `<urn:uuid:...>`.
    pub const RECORD_ID: &str = "WARC-Record-ID";
    /// Exact payload length in bytes.
    pub const CONTENT_LENGTH: &str = "Content-Length";
    /// Record creation date.
    pub const DATE: &str = "WARC-Date";
    /// Record type.
    pub const TYPE: &str = "WARC-Type";
    /// URI the payload was captured from.
    pub const TARGET_URI: &str = "WARC-Target-URI";
    /// MIME type of the payload.
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// Record id of the record this one describes.
    pub const REFERS_TO: &str = "WARC-Refers-To";
    /// Digest of the HTTP body carried in the payload.
    pub const PAYLOAD_DIGEST: &str = "WARC-Payload-Digest";
}

/// Kind of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// An archived HTTP response.
    Response,
    /// A metadata overlay describing another record.
    Metadata,
}

impl RecordType {
    /// Returns the header value for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "response" => Ok(Self::Response),
            "metadata" => Ok(Self::Metadata),
            other => Err(CodecError::UnsupportedRecordType {
                value: other.to_string(),
            }),
        }
    }
}

/// Formats a record id header value from a bare identifier.
#[must_use]
pub fn format_record_id(id: &str) -> String {
    format!("<urn:uuid:{id}>")
}

/// Extracts the bare identifier from a record id header value.
///
/// Values that are not in `<urn:uuid:...>` form are returned unchanged.
#[must_use]
pub fn parse_record_id(value: &str) -> &str {
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .map(|v| v.strip_prefix("urn:uuid:").unwrap_or(v))
        .unwrap_or(value)
}

/// An ordered block of `Name: Value` header lines.
///
/// Lookups are case-insensitive; encoding preserves insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordHeader {
    fields: Vec<(String, String)>,
}

impl RecordHeader {
    /// Creates a header carrying the mandatory fields except the length,
    /// which the writer fills in once the payload size is known.
    #[must_use]
    pub fn new(record_type: RecordType, record_id: &str, date: DateTime<Utc>) -> Self {
        let mut header = Self::default();
        header.push_unchecked(names::RECORD_ID, format_record_id(record_id));
        header.push_unchecked(
            names::DATE,
            date.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        header.push_unchecked(names::TYPE, record_type.as_str().to_string());
        header
    }

    fn push_unchecked(&mut self, name: &str, value: String) {
        self.fields.push((name.to_string(), value));
    }

    /// Returns the first value for `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name` to `value`, replacing an existing field in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains `:`, or if either
    /// part contains CR or LF.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> CodecResult<()> {
        let value = value.into();
        validate_field(name, &value)?;
        self.replace_or_push(name, value);
        Ok(())
    }

    /// Sets `Content-Length`, which is always a valid field.
    pub(crate) fn set_content_length(&mut self, len: u64) {
        self.replace_or_push(names::CONTENT_LENGTH, len.to_string());
    }

    fn replace_or_push(&mut self, name: &str, value: String) {
        match self
            .fields
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Iterates over all fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or not a known type.
    pub fn record_type(&self) -> CodecResult<RecordType> {
        self.require(names::TYPE)?.parse()
    }

    /// Returns the bare record identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing.
    pub fn record_id(&self) -> CodecResult<&str> {
        self.require(names::RECORD_ID).map(parse_record_id)
    }

    /// Returns the declared payload length.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or not a decimal integer.
    pub fn content_length(&self) -> CodecResult<u64> {
        let value = self.require(names::CONTENT_LENGTH)?;
        value
            .trim()
            .parse()
            .map_err(|_| CodecError::InvalidHeaderValue {
                name: names::CONTENT_LENGTH,
                value: value.to_string(),
            })
    }

    /// Returns the record date.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing or not RFC 3339.
    pub fn date(&self) -> CodecResult<DateTime<Utc>> {
        let value = self.require(names::DATE)?;
        DateTime::parse_from_rfc3339(value.trim())
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| CodecError::InvalidHeaderValue {
                name: names::DATE,
                value: value.to_string(),
            })
    }

    /// Returns the target URI, if any.
    #[must_use]
    pub fn target_uri(&self) -> Option<&str> {
        self.get(names::TARGET_URI)
    }

    /// Returns the payload content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get(names::CONTENT_TYPE)
    }

    /// Returns the bare id of the record this one refers to, if any.
    #[must_use]
    pub fn refers_to(&self) -> Option<&str> {
        self.get(names::REFERS_TO).map(parse_record_id)
    }

    /// Checks that all mandatory headers are present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> CodecResult<()> {
        self.record_id()?;
        self.content_length()?;
        self.date()?;
        self.record_type()?;
        Ok(())
    }

    fn require(&self, name: &'static str) -> CodecResult<&str> {
        self.get(name).ok_or(CodecError::MissingHeader { name })
    }

    /// Encodes the version line, all fields and the blank terminator line.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(VERSION_LINE);
        for (name, value) in &self.fields {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Returns the length of [`Self::encode`]'s output.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        VERSION_LINE.len()
            + self
                .fields
                .iter()
                .map(|(n, v)| n.len() + v.len() + 4)
                .sum::<usize>()
            + 2
    }

    /// Parses header lines (without the version line and without the blank
    /// terminator line).
    ///
    /// Lines may end in CRLF or bare LF. Continuation lines are not
    /// supported.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is not valid UTF-8 or has no `:`.
    pub fn parse_lines(lines: &[u8]) -> CodecResult<Self> {
        let mut header = Self::default();
        for raw in lines.split(|&b| b == b'\n') {
            let line = raw.strip_suffix(b"\r").unwrap_or(raw);
            if line.is_empty() {
                continue;
            }
            let line = std::str::from_utf8(line)
                .map_err(|_| CodecError::invalid_header("header line is not UTF-8"))?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| CodecError::invalid_header(format!("no colon in {line:?}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CodecError::invalid_header("empty header name"));
            }
            header.push_unchecked(name, value.trim().to_string());
        }
        Ok(header)
    }
}

fn validate_field(name: &str, value: &str) -> CodecResult<()> {
    if name.is_empty() || name.contains(':') || name.trim() != name {
        return Err(CodecError::invalid_header(format!(
            "invalid header name {name:?}"
        )));
    }
    if name.contains(['\r', '\n']) || value.contains(['\r', '\n']) {
        return Err(CodecError::invalid_header(format!(
            "line break in header {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> RecordHeader {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let mut header = RecordHeader::new(RecordType::Response, "abc-123", date);
        header.set(names::CONTENT_LENGTH, "42").unwrap();
        header
    }

    #[test]
    fn mandatory_fields_are_typed() {
        let header = sample();
        assert_eq!(header.record_type().unwrap(), RecordType::Response);
        assert_eq!(header.record_id().unwrap(), "abc-123");
        assert_eq!(header.content_length().unwrap(), 42);
        assert_eq!(
            header.date().unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
        header.validate().unwrap();
    }

    #[test]
    fn lookup_ignores_case() {
        let header = sample();
        assert_eq!(header.get("warc-type"), Some("response"));
        assert_eq!(header.get("CONTENT-LENGTH"), Some("42"));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut header = sample();
        header.set("content-length", "7").unwrap();
        assert_eq!(header.content_length().unwrap(), 7);
        assert_eq!(header.fields().count(), 4);
    }

    #[test]
    fn content_length_replaces_existing_field() {
        let mut header = sample();
        header.set_content_length(12);
        header.set_content_length(34);
        assert_eq!(header.content_length().unwrap(), 34);
        let count = header
            .fields()
            .filter(|(n, _)| n.eq_ignore_ascii_case(names::CONTENT_LENGTH))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn set_rejects_line_breaks_and_colons() {
        let mut header = sample();
        assert!(header.set("X-Bad", "a\r\nInjected: yes").is_err());
        assert!(header.set("X:Bad", "a").is_err());
        assert!(header.set("", "a").is_err());
    }

    #[test]
    fn encode_then_parse_lines() {
        let header = sample();
        let bytes = header.encode();
        assert!(bytes.starts_with(VERSION_LINE));
        assert!(bytes.ends_with(b"\r\n\r\n"));
        assert_eq!(bytes.len(), header.encoded_len());

        let body = &bytes[VERSION_LINE.len()..bytes.len() - 2];
        assert_eq!(RecordHeader::parse_lines(body).unwrap(), header);
    }

    #[test]
    fn missing_mandatory_header() {
        let header = RecordHeader::parse_lines(b"WARC-Type: response\r\n").unwrap();
        assert!(matches!(
            header.validate(),
            Err(CodecError::MissingHeader { .. })
        ));
    }

    #[test]
    fn unknown_record_type() {
        let header = RecordHeader::parse_lines(b"WARC-Type: request\r\n").unwrap();
        assert!(matches!(
            header.record_type(),
            Err(CodecError::UnsupportedRecordType { .. })
        ));
    }

    #[test]
    fn record_id_forms() {
        assert_eq!(parse_record_id("<urn:uuid:1234>"), "1234");
        assert_eq!(parse_record_id("plain"), "plain");
        assert_eq!(format_record_id("1234"), "<urn:uuid:1234>");
    }
}
