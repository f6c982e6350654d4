//! Storage backend trait definition.

use crate::error::StorageResult;
use std::io::{self, Write};

/// Location of a byte range written to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Offset of the first byte.
    pub offset: u64,
    /// Number of bytes written.
    pub length: u64,
}

impl Extent {
    /// Returns the offset one past the last byte.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// A low-level append-only log for ArcVault.
///
/// Storage backends are **opaque byte logs**. They provide simple operations
/// for reading, appending, and flushing data. The record codec owns all
/// format interpretation - backends do not understand records, artifacts or
/// metadata overlays.
///
/// All operations take `&self`: implementations serialise appends internally,
/// and reads of already-written ranges must not wait for an in-flight append.
///
/// # Invariants
///
/// - `append` and `append_with` return the offset where data was written
/// - offsets are monotonic and gap-free; a failed append leaves the log
///   exactly as it was before the call
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` ensures all appended data is durable
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and volatile repositories
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the log.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&self, data: &[u8]) -> StorageResult<u64>;

    /// Streams an append through a caller-supplied writer.
    ///
    /// `write` receives a sink positioned at the end of the log and must
    /// return the number of bytes it wrote. The backend checks that count
    /// against what actually reached the log; on mismatch or error the log
    /// is rolled back to its previous end.
    ///
    /// # Errors
    ///
    /// Returns an error if `write` fails, if its reported byte count is
    /// wrong, or if an I/O error occurs.
    fn append_with(
        &self,
        write: &mut dyn FnMut(&mut dyn Write) -> io::Result<u64>,
    ) -> StorageResult<Extent>;

    /// Flushes all pending writes to durable storage.
    ///
    /// After this returns successfully, all previously appended data
    /// is guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Returns the current size of the log in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - it ensures that
    /// file metadata (size, timestamps) is also durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Truncates the log to the given size.
    ///
    /// Used to discard a torn tail; never used on the normal append path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&self, new_size: u64) -> StorageResult<()>;
}
