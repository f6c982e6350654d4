//! CDX records and their text renderings.

use super::key::url_sort_key;
use crate::artifact::Artifact;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

/// Format of CDX timestamps.
pub const CDX_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Fills the digits a partial timestamp leaves out.
const TIMESTAMP_PADDING: &str = "00000101000000";

const UNKNOWN_MIME: &str = "unk";
const NONE: &str = "-";

/// One capture as seen by replay tools.
///
/// Field order is the order of every rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxRecord {
    /// Canonical sort key of `url`.
    pub url_sort_key: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Captured URL.
    pub url: String,
    /// MIME type without parameters, or `unk`.
    pub mime_type: String,
    /// HTTP status code.
    pub status: u16,
    /// Payload digest, `algorithm:hex`.
    pub digest: String,
    /// Redirect target, or `-`.
    pub redirect_url: String,
    /// Robot flags, or `-`.
    pub robot_flags: String,
    /// Body length.
    pub length: u64,
    /// Byte offset of the record in its log.
    pub offset: u64,
    /// Name of the log holding the record.
    pub archive_name: String,
}

#[derive(Serialize)]
struct CdxjFields<'a> {
    url: &'a str,
    mime: &'a str,
    status: String,
    digest: &'a str,
    redirect: &'a str,
    robotflags: &'a str,
    length: String,
    offset: String,
    filename: &'a str,
}

impl CdxRecord {
    /// Builds the record for a stored artifact.
    #[must_use]
    pub fn from_artifact(artifact: &Artifact) -> Self {
        let url = artifact.identifier.uri.clone();
        Self {
            url_sort_key: url_sort_key(&url),
            timestamp: artifact.capture_time,
            url,
            mime_type: artifact.mime_type().unwrap_or(UNKNOWN_MIME).to_string(),
            status: artifact.status.code,
            digest: artifact.content_digest.to_string(),
            redirect_url: artifact.redirect_location().unwrap_or(NONE).to_string(),
            robot_flags: NONE.to_string(),
            length: artifact.content_length,
            offset: artifact.locator.offset(),
            archive_name: artifact.locator.log().file_name().to_string(),
        }
    }

    /// Returns the timestamp as 14 digits.
    #[must_use]
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(CDX_TIMESTAMP_FORMAT).to_string()
    }

    /// Renders the space separated form, newline terminated.
    #[must_use]
    pub fn to_columnar(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {} {} {}\n",
            self.url_sort_key,
            self.timestamp_string(),
            self.url,
            self.mime_type,
            self.status,
            self.digest,
            self.redirect_url,
            self.robot_flags,
            self.length,
            self.offset,
            self.archive_name,
        )
    }

    /// Renders the CDXJ form: key and timestamp, then a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields cannot be serialized.
    pub fn to_json(&self) -> CoreResult<String> {
        let fields = CdxjFields {
            url: &self.url,
            mime: &self.mime_type,
            status: self.status.to_string(),
            digest: &self.digest,
            redirect: &self.redirect_url,
            robotflags: &self.robot_flags,
            length: self.length.to_string(),
            offset: self.offset.to_string(),
            filename: &self.archive_name,
        };
        Ok(format!(
            "{} {} {}\n",
            self.url_sort_key,
            self.timestamp_string(),
            serde_json::to_string(&fields)?
        ))
    }

    /// Renders the `<result>` element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let timestamp = self.timestamp_string();
        let status = self.status.to_string();
        let length = self.length.to_string();
        let offset = self.offset.to_string();
        let fields = [
            ("urlkey", self.url_sort_key.as_str()),
            ("capturedate", timestamp.as_str()),
            ("url", self.url.as_str()),
            ("mimetype", self.mime_type.as_str()),
            ("httpresponsecode", status.as_str()),
            ("digest", self.digest.as_str()),
            ("redirecturl", self.redirect_url.as_str()),
            ("robotflags", self.robot_flags.as_str()),
            ("length", length.as_str()),
            ("offset", offset.as_str()),
            ("file", self.archive_name.as_str()),
        ];

        let mut out = String::from("<result>");
        for (tag, value) in fields {
            let _ = write!(out, "<{tag}>{}</{tag}>", xml_escape(value));
        }
        out.push_str("</result>");
        out
    }
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// CDX output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdxFormat {
    /// Space separated fields.
    #[default]
    Columnar,
    /// CDXJ.
    Json,
    /// Wayback XML.
    Xml,
}

impl FromStr for CdxFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cdx" | "columnar" | "text" => Ok(Self::Columnar),
            "cdxj" | "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(CoreError::invalid_argument(format!(
                "unknown CDX format: {other}"
            ))),
        }
    }
}

/// An ordered list of CDX records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdxRecords {
    records: Vec<CdxRecord>,
}

impl CdxRecords {
    /// Wraps `records`, keeping their order.
    #[must_use]
    pub fn new(records: Vec<CdxRecord>) -> Self {
        Self { records }
    }

    /// Returns the records.
    #[must_use]
    pub fn records(&self) -> &[CdxRecord] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders every record in `format`.
    ///
    /// The XML form is a complete document; the others are one line per
    /// record.
    ///
    /// # Errors
    ///
    /// Returns an error if a JSON rendering fails.
    pub fn render(&self, format: CdxFormat) -> CoreResult<String> {
        match format {
            CdxFormat::Columnar => Ok(self.records.iter().map(CdxRecord::to_columnar).collect()),
            CdxFormat::Json => self.records.iter().map(CdxRecord::to_json).collect(),
            CdxFormat::Xml => {
                let mut out = String::from(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><wayback><results>",
                );
                for record in &self.records {
                    out.push_str(&record.to_xml());
                }
                out.push_str("</results></wayback>");
                Ok(out)
            }
        }
    }
}

impl IntoIterator for CdxRecords {
    type Item = CdxRecord;
    type IntoIter = std::vec::IntoIter<CdxRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Parses a CDX timestamp of 1 to 14 digits.
///
/// Missing digits are filled the way replay tools do: month and day
/// become `01`, everything else `0`. So `2024` is the first second of
/// 2024 and `20240315` is midnight on 15 March.
///
/// # Errors
///
/// Returns `InvalidArgument` if `s` is empty, too long, not all digits,
/// or does not name a real date and time.
pub fn parse_cdx_timestamp(s: &str) -> CoreResult<DateTime<Utc>> {
    if s.is_empty() || s.len() > TIMESTAMP_PADDING.len() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_argument(format!(
            "invalid CDX timestamp: {s:?}"
        )));
    }
    let padded = format!("{s}{}", &TIMESTAMP_PADDING[s.len()..]);
    NaiveDateTime::parse_from_str(&padded, CDX_TIMESTAMP_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| CoreError::invalid_argument(format!("invalid CDX timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> CdxRecord {
        CdxRecord {
            url_sort_key: "com,example)/a".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 5).unwrap(),
            url: "http://example.com/a".to_string(),
            mime_type: "text/html".to_string(),
            status: 200,
            digest: "sha256:abcd".to_string(),
            redirect_url: "-".to_string(),
            robot_flags: "-".to_string(),
            length: 1043,
            offset: 512,
            archive_name: "artifacts.warc".to_string(),
        }
    }

    #[test]
    fn columnar_has_eleven_fields() {
        assert_eq!(
            sample().to_columnar(),
            "com,example)/a 20240315083005 http://example.com/a text/html 200 sha256:abcd - - 1043 512 artifacts.warc\n"
        );
    }

    #[test]
    fn cdxj_prefix_and_object() {
        assert_eq!(
            sample().to_json().unwrap(),
            "com,example)/a 20240315083005 {\"url\":\"http://example.com/a\",\"mime\":\"text/html\",\"status\":\"200\",\"digest\":\"sha256:abcd\",\"redirect\":\"-\",\"robotflags\":\"-\",\"length\":\"1043\",\"offset\":\"512\",\"filename\":\"artifacts.warc\"}\n"
        );
    }

    #[test]
    fn xml_children_in_order_and_escaped() {
        let mut record = sample();
        record.url = "http://example.com/a?x=1&y=<2>".to_string();
        let xml = record.to_xml();
        assert!(xml.starts_with("<result><urlkey>com,example)/a</urlkey><capturedate>20240315083005</capturedate>"));
        assert!(xml.contains("<url>http://example.com/a?x=1&amp;y=&lt;2&gt;</url>"));
        assert!(xml.ends_with("<offset>512</offset><file>artifacts.warc</file></result>"));
    }

    #[test]
    fn collection_xml_wrapper() {
        let records = CdxRecords::new(vec![sample(), sample()]);
        let xml = records.render(CdxFormat::Xml).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><wayback><results><result>"));
        assert!(xml.ends_with("</result></results></wayback>"));
        assert_eq!(xml.matches("<result>").count(), 2);

        let text = records.render(CdxFormat::Columnar).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn partial_timestamps_are_padded() {
        assert_eq!(
            parse_cdx_timestamp("2024").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cdx_timestamp("20240315").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cdx_timestamp("20240315083005").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 5).unwrap()
        );
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        for bad in ["", "2024x", "202403150830051", "20241301"] {
            assert!(parse_cdx_timestamp(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn formats_parse() {
        assert_eq!("cdxj".parse::<CdxFormat>().unwrap(), CdxFormat::Json);
        assert_eq!("XML".parse::<CdxFormat>().unwrap(), CdxFormat::Xml);
        assert!("yaml".parse::<CdxFormat>().is_err());
    }
}
