//! In-memory storage backend.

use crate::backend::{Extent, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::io::{self, Write};

/// An in-memory append-only log.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Volatile repositories that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use arcvault_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn append_with(
        &self,
        write: &mut dyn FnMut(&mut dyn Write) -> io::Result<u64>,
    ) -> StorageResult<Extent> {
        // Staged outside the lock so reads are not held up by the source.
        let mut staged = Vec::new();
        let reported = write(&mut staged)?;
        let written = staged.len() as u64;
        if reported != written {
            return Err(StorageError::Corrupted(format!(
                "append reported {reported} bytes but wrote {written}"
            )));
        }

        let mut data = self.data.write();
        let start = data.len() as u64;
        data.extend_from_slice(&staged);
        Ok(Extent {
            offset: start,
            length: written,
        })
    }

    fn flush(&self) -> StorageResult<()> {
        // In-memory backend has no pending writes
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&self) -> StorageResult<()> {
        // In-memory backend has no metadata to sync
        Ok(())
    }

    fn truncate(&self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let current_size = data.len() as u64;

        if new_size > current_size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, current_size
                ),
            )));
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_append_returns_correct_offset() {
        let backend = InMemoryBackend::new();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn memory_read_at_returns_correct_data() {
        let backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        assert_eq!(&backend.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(&backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_read_at_past_end_fails() {
        let backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_append_with_reports_extent() {
        let backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();

        let extent = backend
            .append_with(&mut |sink| {
                sink.write_all(b"defgh")?;
                Ok(5)
            })
            .unwrap();

        assert_eq!(extent, Extent { offset: 3, length: 5 });
        assert_eq!(extent.end(), 8);
        assert_eq!(backend.data(), b"abcdefgh");
    }

    #[test]
    fn memory_reads_proceed_during_append_with() {
        let backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();

        let extent = backend
            .append_with(&mut |sink| {
                // Would deadlock if the append held the log's lock here.
                let issued = backend.read_at(0, 3).map_err(io::Error::other)?;
                assert_eq!(issued, b"abc");
                sink.write_all(b"de")?;
                Ok(2)
            })
            .unwrap();

        assert_eq!(extent, Extent { offset: 3, length: 2 });
        assert_eq!(backend.data(), b"abcde");
    }

    #[test]
    fn memory_append_with_miscount_rolls_back() {
        let backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();

        let result = backend.append_with(&mut |sink| {
            sink.write_all(b"de")?;
            Ok(7)
        });

        assert!(matches!(result, Err(StorageError::Corrupted(_))));
        assert_eq!(backend.data(), b"abc");
    }

    #[test]
    fn memory_append_with_error_rolls_back() {
        let backend = InMemoryBackend::new();

        let result = backend.append_with(&mut |sink| {
            sink.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "source failed"))
        });

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn memory_with_data() {
        let backend = InMemoryBackend::with_data(b"preloaded".to_vec());
        assert_eq!(backend.size().unwrap(), 9);
        assert_eq!(backend.read_at(0, 9).unwrap(), b"preloaded");
    }

    #[test]
    fn memory_truncate_partial() {
        let backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
    }

    #[test]
    fn memory_truncate_to_larger_size_fails() {
        let backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        assert!(backend.truncate(100).is_err());
    }
}
