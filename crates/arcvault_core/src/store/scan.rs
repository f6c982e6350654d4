//! Lazy enumeration of every record in a volume.

use super::records::{decode_artifact, decode_metadata, ScannedRecord, StoredRecord};
use super::volume::{LogName, LogVolume};
use crate::error::{CoreError, CoreResult};
use crate::locator::StorageLocator;
use arcvault_codec::{CodecError, RecordHead, RecordReader, RecordType};
use arcvault_storage::StorageBackend;
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::debug;

const SCAN_BUFFER_SIZE: usize = 256 * 1024;

/// Adapts a storage backend to `Read + Seek`.
///
/// The length is sampled at construction, so records appended while the
/// reader is in use stay invisible to it.
pub(crate) struct BackendReader {
    backend: Arc<dyn StorageBackend>,
    position: u64,
    len: u64,
}

impl BackendReader {
    pub(crate) fn new(backend: Arc<dyn StorageBackend>) -> CoreResult<Self> {
        let len = backend.size()?;
        Ok(Self {
            backend,
            position: 0,
            len,
        })
    }
}

impl Read for BackendReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.position);
        let n = remaining.min(buf.len() as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        let data = self
            .backend
            .read_at(self.position, n)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        buf[..n].copy_from_slice(&data);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for BackendReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of log")
        })?;
        Ok(self.position)
    }
}

/// Opens a record reader over a whole log.
pub(crate) fn log_reader(
    backend: Arc<dyn StorageBackend>,
) -> CoreResult<RecordReader<BackendReader>> {
    Ok(RecordReader::with_capacity(
        SCAN_BUFFER_SIZE,
        BackendReader::new(backend)?,
    )?)
}

/// Decodes a record head into a stored record, fetching the rest of the
/// payload from `backend` if the preview is too short.
pub(crate) fn decode_head(
    head: &RecordHead,
    backend: &dyn StorageBackend,
    locator: StorageLocator,
) -> CoreResult<StoredRecord> {
    let payload = if head.preview_is_complete() {
        None
    } else if head.header.record_type()? == RecordType::Metadata {
        let len = usize::try_from(head.payload_len())
            .map_err(|_| CoreError::invalid_record("overlay payload too large"))?;
        Some(backend.read_at(head.payload_offset, len)?)
    } else {
        None
    };
    let bytes = payload.as_deref().unwrap_or(&head.preview);

    match head.header.record_type()? {
        RecordType::Response => Ok(StoredRecord::Artifact(decode_artifact(
            &head.header,
            bytes,
            head.payload_len(),
            locator,
        )?)),
        RecordType::Metadata => Ok(StoredRecord::Metadata(decode_metadata(
            &head.header,
            bytes,
        )?)),
    }
}

struct OpenLog {
    name: LogName,
    backend: Arc<dyn StorageBackend>,
    reader: RecordReader<BackendReader>,
    needs_resync: bool,
}

/// A lazy scan over every record of every log in a volume.
///
/// Logs are visited in name order and records in offset order, so
/// metadata records always follow the artifact records they overlay.
///
/// A damaged record yields a single `Err` item; the scan then skips to
/// the next record boundary and continues. A torn record at the very end
/// of a log is treated as the end of that log.
pub struct StoreScan {
    volume: Arc<dyn LogVolume>,
    pending: VecDeque<LogName>,
    current: Option<OpenLog>,
    preview: usize,
    torn: Vec<(LogName, u64)>,
}

impl StoreScan {
    pub(crate) fn new(volume: Arc<dyn LogVolume>, preview: usize) -> CoreResult<Self> {
        let pending = volume.list_logs()?.into();
        Ok(Self {
            volume,
            pending,
            current: None,
            preview,
            torn: Vec::new(),
        })
    }

    /// Returns the logs found so far that end in a torn record, with the
    /// offset where that record starts.
    #[must_use]
    pub fn torn_tails(&self) -> &[(LogName, u64)] {
        &self.torn
    }

    fn open_next(&mut self) -> Option<CoreResult<()>> {
        let name = self.pending.pop_front()?;
        let opened = self.volume.open_log(&name, false).and_then(|backend| {
            let backend = backend.ok_or_else(|| {
                CoreError::invalid_argument(format!("log {name} disappeared during scan"))
            })?;
            let reader = log_reader(backend.clone())?;
            Ok(OpenLog {
                name,
                backend,
                reader,
                needs_resync: false,
            })
        });
        Some(opened.map(|log| self.current = Some(log)))
    }
}

impl Iterator for StoreScan {
    type Item = CoreResult<ScannedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(log) = self.current.as_mut() else {
                if let Err(e) = self.open_next()? {
                    return Some(Err(e));
                }
                continue;
            };

            if log.needs_resync {
                log.needs_resync = false;
                match log.reader.resync() {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        self.current = None;
                        continue;
                    }
                    Err(e) => {
                        self.current = None;
                        return Some(Err(e.into()));
                    }
                }
            }

            match log.reader.read_head(self.preview) {
                Ok(None) => {
                    self.current = None;
                }
                Ok(Some(head)) => {
                    let locator = StorageLocator::new(
                        self.volume.scheme(),
                        log.name.clone(),
                        head.offset,
                        head.length,
                    );
                    let record = decode_head(&head, log.backend.as_ref(), locator.clone());
                    return Some(record.map(|record| ScannedRecord { record, locator }));
                }
                Err(CodecError::Truncated { offset }) => match log.reader.resync() {
                    Ok(None) => {
                        debug!(log = %log.name, offset, "torn record at end of log");
                        self.torn.push((log.name.clone(), offset));
                        self.current = None;
                    }
                    Ok(Some(_)) => {
                        return Some(Err(CodecError::Truncated { offset }.into()));
                    }
                    Err(e) => {
                        self.current = None;
                        return Some(Err(e.into()));
                    }
                },
                Err(e) => {
                    log.needs_resync = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
