//! Record encoding: spill buffering, byte counting and framing.

use crate::header::{RecordHeader, TRAILER};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Default in-memory limit for a [`SpillBuffer`] (16 MiB).
pub const DEFAULT_SPILL_THRESHOLD: usize = 16 * 1024 * 1024;

/// A writer that counts the bytes passed through to its sink.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wraps `inner` with a zero count.
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Returns the number of bytes accepted by the sink so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Payload staging area whose size is unknown until the source is drained.
///
/// Bytes are kept in memory until `threshold` is exceeded, then moved to an
/// anonymous temporary file that is removed when the buffer is dropped.
#[derive(Debug)]
pub struct SpillBuffer {
    threshold: usize,
    memory: Vec<u8>,
    file: Option<File>,
    len: u64,
}

impl SpillBuffer {
    /// Creates an empty buffer that spills above `threshold` bytes.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            memory: Vec::new(),
            file: None,
            len: 0,
        }
    }

    /// Drains `source` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source or writing the spill file
    /// fails.
    pub fn from_reader<R: Read>(mut source: R, threshold: usize) -> io::Result<Self> {
        let mut buffer = Self::new(threshold);
        io::copy(&mut source, &mut buffer)?;
        Ok(buffer)
    }

    /// Returns the number of bytes buffered.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the contents live in a temporary file.
    #[must_use]
    pub fn is_spilled(&self) -> bool {
        self.file.is_some()
    }

    /// Returns a reader over the buffered bytes, starting from the first.
    ///
    /// # Errors
    ///
    /// Returns an error if the spill file cannot be rewound.
    pub fn reader(&mut self) -> io::Result<Box<dyn Read + '_>> {
        match self.file.as_mut() {
            Some(file) => {
                file.flush()?;
                file.seek(SeekFrom::Start(0))?;
                Ok(Box::new(file.take(self.len)))
            }
            None => Ok(Box::new(self.memory.as_slice())),
        }
    }

    fn spill(&mut self) -> io::Result<&mut File> {
        let mut file = tempfile::tempfile()?;
        file.write_all(&self.memory)?;
        self.memory = Vec::new();
        Ok(self.file.insert(file))
    }
}

impl Write for SpillBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.file.is_none() && self.memory.len() + buf.len() > self.threshold {
            self.spill()?;
        }
        match self.file.as_mut() {
            Some(file) => file.write_all(buf)?,
            None => self.memory.extend_from_slice(buf),
        }
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

enum Payload {
    Bytes(Bytes),
    Spilled(SpillBuffer),
}

/// Frames a header and payload as one record.
///
/// The `Content-Length` header is always set from the payload, so the
/// framing is self-delimiting regardless of what the caller put there.
pub struct RecordWriter {
    header: RecordHeader,
    payload: Payload,
}

impl RecordWriter {
    /// Creates a writer over an in-memory payload.
    #[must_use]
    pub fn from_bytes(header: RecordHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self::with_payload(header, payload.len() as u64, Payload::Bytes(payload))
    }

    /// Creates a writer over a spill buffer.
    #[must_use]
    pub fn from_spill(header: RecordHeader, payload: SpillBuffer) -> Self {
        let len = payload.len();
        Self::with_payload(header, len, Payload::Spilled(payload))
    }

    fn with_payload(mut header: RecordHeader, len: u64, payload: Payload) -> Self {
        header.set_content_length(len);
        Self { header, payload }
    }

    /// Returns the header that will be written.
    #[must_use]
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Returns the payload length.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        match &self.payload {
            Payload::Bytes(b) => b.len() as u64,
            Payload::Spilled(s) => s.len(),
        }
    }

    /// Returns the total number of bytes [`Self::write_to`] emits.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.header.encoded_len() as u64 + self.payload_len() + TRAILER.len() as u64
    }

    /// Writes the framed record to `sink`.
    ///
    /// Returns the exact number of bytes emitted, as counted on the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or if the payload source yields a
    /// different number of bytes than was buffered.
    pub fn write_to<W: Write>(&mut self, sink: W) -> io::Result<u64> {
        let mut out = CountingWriter::new(sink);
        out.write_all(&self.header.encode())?;

        let expected = self.payload_len();
        let copied = match &mut self.payload {
            Payload::Bytes(bytes) => {
                out.write_all(&bytes[..])?;
                bytes.len() as u64
            }
            Payload::Spilled(spill) => io::copy(&mut spill.reader()?, &mut out)?,
        };
        if copied != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload yielded {copied} of {expected} bytes"),
            ));
        }

        out.write_all(TRAILER)?;
        out.flush()?;
        Ok(out.count())
    }

    /// Encodes the record into a new vector.
    ///
    /// # Errors
    ///
    /// Returns an error if a spilled payload cannot be read back.
    pub fn to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        self.write_to(&mut out)?;
        Ok(out)
    }
}
