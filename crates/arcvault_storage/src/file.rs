//! File-based storage backend for persistent logs.

use crate::backend::{Extent, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based append-only log.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Thread Safety
///
/// Appends are serialised on the writer handle. Reads open their own
/// handle and only consult the published size, so they never wait for an
/// append to finish.
///
/// # Example
///
/// ```no_run
/// use arcvault_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("artifacts.warc")).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    writer: Mutex<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// If the file exists, it is opened for reading and appending.
    /// If it doesn't exist, a new file is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(file),
            size: RwLock::new(size),
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(file: &mut File, size: u64) -> io::Result<()> {
        file.set_len(size)?;
        file.seek(SeekFrom::Start(size))?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&self, data: &[u8]) -> StorageResult<u64> {
        let mut file = self.writer.lock();
        let offset = *self.size.read();

        if data.is_empty() {
            return Ok(offset);
        }

        file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = file.write_all(data) {
            Self::rollback(&mut file, offset)?;
            return Err(e.into());
        }
        *self.size.write() = offset + data.len() as u64;

        Ok(offset)
    }

    fn append_with(
        &self,
        write: &mut dyn FnMut(&mut dyn Write) -> io::Result<u64>,
    ) -> StorageResult<Extent> {
        let mut file = self.writer.lock();
        let start = *self.size.read();
        file.seek(SeekFrom::Start(start))?;

        let result = {
            let mut sink = BufWriter::new(&mut *file);
            write(&mut sink).and_then(|n| sink.flush().map(|()| n))
        };

        let reported = match result {
            Ok(n) => n,
            Err(e) => {
                Self::rollback(&mut file, start)?;
                return Err(e.into());
            }
        };

        let written = file.stream_position()? - start;
        if reported != written {
            Self::rollback(&mut file, start)?;
            return Err(StorageError::Corrupted(format!(
                "append reported {reported} bytes but wrote {written}"
            )));
        }

        *self.size.write() = start + written;
        Ok(Extent {
            offset: start,
            length: written,
        })
    }

    fn flush(&self) -> StorageResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&self) -> StorageResult<()> {
        self.writer.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&self, new_size: u64) -> StorageResult<()> {
        let mut file = self.writer.lock();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}
