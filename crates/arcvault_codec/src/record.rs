//! Complete in-memory records.

use crate::error::{CodecError, CodecResult};
use crate::header::{RecordHeader, RecordType, MAX_HEADER_SIZE, TRAILER, VERSION_LINE};
use bytes::Bytes;

/// One record with its full payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    header: RecordHeader,
    payload: Bytes,
}

impl Record {
    /// Creates a record, setting `Content-Length` from the payload.
    #[must_use]
    pub fn new(mut header: RecordHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        header.set_content_length(payload.len() as u64);
        Self { header, payload }
    }

    /// Returns the header.
    #[must_use]
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type header is missing or unknown.
    pub fn record_type(&self) -> CodecResult<RecordType> {
        self.header.record_type()
    }

    /// Splits the record into header and payload.
    #[must_use]
    pub fn into_parts(self) -> (RecordHeader, Bytes) {
        (self.header, self.payload)
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(TRAILER);
        out
    }

    /// Returns the length of [`Self::encode`]'s output.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        (self.header.encoded_len() + self.payload.len() + TRAILER.len()) as u64
    }

    /// Decodes exactly one record occupying all of `data`.
    ///
    /// This is the random-access path: a locator read yields the bytes of
    /// exactly one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not one well-formed record.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let (record, consumed) = Self::decode_prefix(data)?;
        if consumed != data.len() {
            return Err(CodecError::invalid_header(format!(
                "{} trailing bytes after record",
                data.len() - consumed
            )));
        }
        Ok(record)
    }

    /// Decodes the record at the start of `data`, returning it and the
    /// number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not a well-formed record.
    pub fn decode_prefix(data: &[u8]) -> CodecResult<(Self, usize)> {
        if !data.starts_with(VERSION_LINE) {
            return Err(if data.len() < VERSION_LINE.len() {
                CodecError::Truncated { offset: 0 }
            } else {
                CodecError::InvalidVersionLine { offset: 0 }
            });
        }

        let search = &data[..data.len().min(MAX_HEADER_SIZE)];
        let lines_start = VERSION_LINE.len();
        let header_end = find_blank_line(search, lines_start).ok_or_else(|| {
            if data.len() >= MAX_HEADER_SIZE {
                CodecError::HeaderTooLarge {
                    offset: 0,
                    limit: MAX_HEADER_SIZE,
                }
            } else {
                CodecError::Truncated { offset: 0 }
            }
        })?;

        let header = RecordHeader::parse_lines(&data[lines_start..header_end.lines_end])?;
        header.validate()?;

        let payload_start = header_end.block_end;
        let len = usize::try_from(header.content_length()?)
            .map_err(|_| CodecError::Truncated { offset: 0 })?;
        let payload_end = payload_start
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or(CodecError::Truncated { offset: 0 })?;
        let record_end = payload_end + TRAILER.len();
        if record_end > data.len() {
            return Err(CodecError::Truncated { offset: 0 });
        }
        if &data[payload_end..record_end] != TRAILER {
            return Err(CodecError::MissingTrailer { offset: 0 });
        }

        let payload = Bytes::copy_from_slice(&data[payload_start..payload_end]);
        Ok((Self { header, payload }, record_end))
    }
}

/// Where a header block's lines and blank terminator line end.
pub(crate) struct BlankLine {
    /// End of the last header line (exclusive), before the blank line.
    pub lines_end: usize,
    /// First byte after the blank line.
    pub block_end: usize,
}

/// Finds the blank line ending a header block, starting the search at a
/// line boundary `from`.
pub(crate) fn find_blank_line(data: &[u8], from: usize) -> Option<BlankLine> {
    let mut line_start = from;
    while line_start < data.len() {
        let rest = &data[line_start..];
        if rest.starts_with(b"\r\n") {
            return Some(BlankLine {
                lines_end: line_start,
                block_end: line_start + 2,
            });
        }
        if rest.starts_with(b"\n") {
            return Some(BlankLine {
                lines_end: line_start,
                block_end: line_start + 1,
            });
        }
        let newline = rest.iter().position(|&b| b == b'\n')?;
        line_start += newline + 1;
    }
    None
}
