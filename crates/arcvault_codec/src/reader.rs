//! Streaming, seekable record decoding.

use crate::error::{CodecError, CodecResult};
use crate::header::{RecordHeader, MAX_HEADER_SIZE, TRAILER, VERSION_LINE};
use crate::record::Record;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

const DEFAULT_BUF_SIZE: usize = 64 * 1024;

/// A decoded record together with where it sits in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAt {
    /// Offset of the record's first byte.
    pub offset: u64,
    /// Total bytes occupied, trailer included.
    pub length: u64,
    /// The record.
    pub record: Record,
}

/// A record header plus the first bytes of its payload.
///
/// Produced by [`RecordReader::read_head`] for scans that must not pull
/// large payloads into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHead {
    /// Offset of the record's first byte.
    pub offset: u64,
    /// Total bytes occupied, trailer included.
    pub length: u64,
    /// Offset of the first payload byte.
    pub payload_offset: u64,
    /// The parsed header.
    pub header: RecordHeader,
    /// Up to the requested number of leading payload bytes.
    pub preview: Vec<u8>,
}

impl RecordHead {
    /// Returns the declared payload length.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.length - (self.payload_offset - self.offset) - TRAILER.len() as u64
    }

    /// Returns true if the preview holds the entire payload.
    #[must_use]
    pub fn preview_is_complete(&self) -> bool {
        self.preview.len() as u64 == self.payload_len()
    }
}

/// Reads records from a seekable byte stream.
///
/// The reader can be positioned at any record boundary with
/// [`seek_to`](Self::seek_to), so a stored offset is enough to decode a
/// record without scanning from the start of the log.
///
/// # Error Handling
///
/// A malformed record returns an error and leaves the reader where the
/// failure was detected. Calling [`resync`](Self::resync) then skips to the
/// next version line that starts a line after the failed record's first
/// byte, so a single damaged record does not hide the records behind it.
///
/// # Example
///
/// ```rust,ignore
/// let mut reader = RecordReader::new(file)?;
/// loop {
///     match reader.read_record() {
///         Ok(Some(at)) => handle(at),
///         Ok(None) => break,
///         Err(_) => if reader.resync()?.is_none() { break },
///     }
/// }
/// ```
pub struct RecordReader<R> {
    inner: BufReader<R>,
    position: u64,
    end: u64,
    failed_at: Option<u64>,
}

impl<R: Read + Seek> RecordReader<R> {
    /// Creates a reader positioned at the start of `inner`.
    ///
    /// The stream length is sampled once; bytes appended afterwards are
    /// not visible to this reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be measured or rewound.
    pub fn new(inner: R) -> CodecResult<Self> {
        Self::with_capacity(DEFAULT_BUF_SIZE, inner)
    }

    /// Creates a reader with a read buffer of `capacity` bytes.
    ///
    /// Backends where every read is costly benefit from a large buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be measured or rewound.
    pub fn with_capacity(capacity: usize, mut inner: R) -> CodecResult<Self> {
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: BufReader::with_capacity(capacity, inner),
            position: 0,
            end,
            failed_at: None,
        })
    }

    /// Returns the current stream position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the stream length sampled at construction.
    #[must_use]
    pub fn stream_len(&self) -> u64 {
        self.end
    }

    /// Positions the reader at `offset`, which should be a record boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking fails.
    pub fn seek_to(&mut self, offset: u64) -> CodecResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Reads the next record with its full payload.
    ///
    /// Returns `Ok(None)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or reading fails.
    pub fn read_record(&mut self) -> CodecResult<Option<RecordAt>> {
        let offset = self.position;
        let result = self.read_record_inner(offset);
        self.note_failure(offset, result)
    }

    /// Reads the next record's header and at most `preview` payload bytes,
    /// skipping the rest of the payload.
    ///
    /// Returns `Ok(None)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or reading fails.
    pub fn read_head(&mut self, preview: usize) -> CodecResult<Option<RecordHead>> {
        let offset = self.position;
        let result = self.read_head_inner(offset, preview);
        self.note_failure(offset, result)
    }

    /// Skips forward to the next record boundary after a failed read.
    ///
    /// Returns the offset of the boundary found, or `None` if the stream
    /// holds no further records.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the stream fails.
    pub fn resync(&mut self) -> CodecResult<Option<u64>> {
        let from = self.failed_at.take().map_or(self.position, |o| o + 1);
        if from >= self.end {
            self.seek_to(self.end)?;
            return Ok(None);
        }

        let mut prev = if from == 0 {
            b'\n'
        } else {
            self.seek_to(from - 1)?;
            let mut byte = [0u8; 1];
            self.inner.read_exact(&mut byte)?;
            self.position = from;
            byte[0]
        };

        let mut matched = 0usize;
        let mut candidate = 0u64;
        loop {
            let (consumed, found) = {
                let buf = self.inner.fill_buf()?;
                if buf.is_empty() {
                    return Ok(None);
                }
                let mut consumed = 0usize;
                let mut found = false;
                for &b in buf {
                    let pos = self.position + consumed as u64;
                    consumed += 1;
                    if matched > 0 && b == VERSION_LINE[matched] {
                        matched += 1;
                    } else if b == VERSION_LINE[0] && prev == b'\n' {
                        matched = 1;
                        candidate = pos;
                    } else {
                        matched = 0;
                    }
                    prev = b;
                    if matched == VERSION_LINE.len() {
                        found = true;
                        break;
                    }
                }
                (consumed, found)
            };
            self.inner.consume(consumed);
            self.position += consumed as u64;
            if found {
                self.seek_to(candidate)?;
                return Ok(Some(candidate));
            }
        }
    }

    fn note_failure<T>(&mut self, offset: u64, result: CodecResult<T>) -> CodecResult<T> {
        if result.is_err() {
            self.failed_at = Some(offset);
        }
        result
    }

    fn read_record_inner(&mut self, offset: u64) -> CodecResult<Option<RecordAt>> {
        let Some(header) = self.read_header(offset)? else {
            return Ok(None);
        };
        let len = self.check_bounds(&header, offset)?;

        let mut payload = vec![0u8; len as usize];
        self.read_exact(&mut payload, offset)?;
        self.read_trailer(offset)?;

        Ok(Some(RecordAt {
            offset,
            length: self.position - offset,
            record: Record::new(header, payload),
        }))
    }

    fn read_head_inner(&mut self, offset: u64, preview: usize) -> CodecResult<Option<RecordHead>> {
        let Some(header) = self.read_header(offset)? else {
            return Ok(None);
        };
        let len = self.check_bounds(&header, offset)?;
        let payload_offset = self.position;

        let take = len.min(preview as u64) as usize;
        let mut head = vec![0u8; take];
        self.read_exact(&mut head, offset)?;
        self.seek_to(payload_offset + len)?;
        self.read_trailer(offset)?;

        Ok(Some(RecordHead {
            offset,
            length: self.position - offset,
            payload_offset,
            header,
            preview: head,
        }))
    }

    /// Reads the version line and header block, leaving the reader at the
    /// first payload byte.
    fn read_header(&mut self, offset: u64) -> CodecResult<Option<RecordHeader>> {
        if offset >= self.end {
            return Ok(None);
        }

        let mut block = Vec::new();
        self.read_line(&mut block, offset)?;
        if block != VERSION_LINE {
            return Err(if self.position >= self.end && block.len() < VERSION_LINE.len() {
                CodecError::Truncated { offset }
            } else {
                CodecError::InvalidVersionLine { offset }
            });
        }

        let lines_start = block.len();
        loop {
            let line_start = block.len();
            if self.read_line(&mut block, offset)? == 0 {
                return Err(CodecError::Truncated { offset });
            }
            let line = &block[line_start..];
            if line == b"\r\n" || line == b"\n" {
                let header = RecordHeader::parse_lines(&block[lines_start..line_start])?;
                header.validate()?;
                return Ok(Some(header));
            }
        }
    }

    fn read_line(&mut self, block: &mut Vec<u8>, offset: u64) -> CodecResult<usize> {
        let budget = (MAX_HEADER_SIZE - block.len().min(MAX_HEADER_SIZE)) as u64;
        let n = (&mut self.inner)
            .take(budget + 1)
            .read_until(b'\n', block)?;
        self.position += n as u64;
        if block.len() > MAX_HEADER_SIZE {
            return Err(CodecError::HeaderTooLarge {
                offset,
                limit: MAX_HEADER_SIZE,
            });
        }
        Ok(n)
    }

    fn check_bounds(&self, header: &RecordHeader, offset: u64) -> CodecResult<u64> {
        let len = header.content_length()?;
        self.position
            .checked_add(len)
            .and_then(|end| end.checked_add(TRAILER.len() as u64))
            .filter(|end| *end <= self.end)
            .ok_or(CodecError::Truncated { offset })?;
        Ok(len)
    }

    fn read_exact(&mut self, buf: &mut [u8], offset: u64) -> CodecResult<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated { offset },
            _ => CodecError::Io(e),
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn read_trailer(&mut self, offset: u64) -> CodecResult<()> {
        let mut trailer = [0u8; 4];
        self.read_exact(&mut trailer, offset)?;
        if trailer != TRAILER {
            return Err(CodecError::MissingTrailer { offset });
        }
        Ok(())
    }
}
