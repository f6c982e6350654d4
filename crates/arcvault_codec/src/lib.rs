//! # ArcVault Codec
//!
//! Self-describing record framing for ArcVault logs.
//!
//! Every record is laid out as:
//!
//! ```text
//! WARC/1.0\r\n
//! Name: Value\r\n        (one or more header lines)
//! \r\n
//! <Content-Length payload bytes>
//! \r\n\r\n
//! ```
//!
//! The framing is self-delimiting: `Content-Length` gives the exact payload
//! size, so a record can be decoded from its offset alone, and a scan that
//! hits a damaged record can resynchronise on the next version line.
//!
//! ## Usage
//!
//! ```
//! use arcvault_codec::{names, Record, RecordHeader, RecordType};
//! use chrono::Utc;
//!
//! let mut header = RecordHeader::new(RecordType::Response, "id-1", Utc::now());
//! header.set(names::TARGET_URI, "http://example.com/").unwrap();
//! let record = Record::new(header, &b"HTTP/1.1 200 OK\r\n\r\nhi"[..]);
//!
//! let bytes = record.encode();
//! let decoded = Record::decode(&bytes).unwrap();
//! assert_eq!(decoded, record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod header;
mod reader;
mod record;
mod writer;

pub use error::{CodecError, CodecResult};
pub use header::{
    format_record_id, names, parse_record_id, RecordHeader, RecordType, MAX_HEADER_SIZE,
    TRAILER, VERSION_LINE,
};
pub use reader::{RecordAt, RecordHead, RecordReader};
pub use record::Record;
pub use writer::{CountingWriter, RecordWriter, SpillBuffer, DEFAULT_SPILL_THRESHOLD};
