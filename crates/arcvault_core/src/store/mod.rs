//! The artifact store.
//!
//! The store owns the logs of a repository. Each (collection, AU) pair
//! has one append-only log holding its artifact records and the metadata
//! overlays that follow them.
//!
//! ## Concurrency
//!
//! Appends to one log are serialised by that log's writer mutex, which
//! keeps offsets gap-free and versions ordered within the log. Appends to
//! different logs run in parallel. Reads go straight to the backend with
//! an issued locator and never take a writer lock.

mod records;
mod scan;
mod volume;

pub use records::{ext, ScannedRecord, StoredRecord};
pub use scan::StoreScan;
pub use volume::{DirectoryVolume, InMemoryVolume, LogName, LogVolume};

use crate::artifact::{parse_http_head, Artifact, ArtifactData, ArtifactSpec};
use crate::config::Config;
use crate::digest::{DigestAlgorithm, DigestFilter};
use crate::error::{CoreError, CoreResult};
use crate::locator::StorageLocator;
use crate::metadata::MetadataOverlay;
use crate::types::{ArtifactId, ArtifactIdentifier, ArtifactStem};
use arcvault_codec::{Record, RecordType, RecordWriter, SpillBuffer};
use arcvault_storage::StorageBackend;
use chrono::{SubsecRound, Utc};
use parking_lot::{Mutex, RwLock};
use records::{artifact_header, decode_artifact, decode_metadata, metadata_header};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One open log and its writer lock.
struct LogHandle {
    backend: Arc<dyn StorageBackend>,
    writer: Mutex<()>,
}

/// Collects an HTTP head, refusing to grow past a limit.
struct HeadCapture {
    bytes: Vec<u8>,
    limit: usize,
}

impl Write for HeadCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.bytes.len() + buf.len() > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("HTTP head exceeds {} bytes", self.limit),
            ));
        }
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Persistent, append-only storage of artifacts and overlays.
pub struct ArtifactStore {
    volume: Arc<dyn LogVolume>,
    logs: RwLock<HashMap<LogName, Arc<LogHandle>>>,
    versions: Mutex<HashMap<ArtifactStem, u32>>,
    algorithm: DigestAlgorithm,
    spill_threshold: usize,
    max_http_head_size: usize,
    sync_on_append: bool,
}

impl ArtifactStore {
    /// Opens a store over `volume`.
    ///
    /// Existing logs are scanned once so that version numbering continues
    /// where it left off.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDigestAlgorithm` if the configured algorithm is
    /// unknown, or an error if the logs cannot be listed.
    pub fn open(volume: Arc<dyn LogVolume>, config: &Config) -> CoreResult<Self> {
        let store = Self {
            volume,
            logs: RwLock::new(HashMap::new()),
            versions: Mutex::new(HashMap::new()),
            algorithm: DigestAlgorithm::from_name(&config.digest_algorithm)?,
            spill_threshold: config.spill_threshold,
            max_http_head_size: config.max_http_head_size,
            sync_on_append: config.sync_on_append,
        };
        store.prime_versions()?;
        Ok(store)
    }

    fn prime_versions(&self) -> CoreResult<()> {
        let mut scan = self.scan()?;
        let mut versions = self.versions.lock();
        for item in scan.by_ref() {
            // Damaged records are reported by the repository rebuild.
            if let Ok(ScannedRecord {
                record: StoredRecord::Artifact(artifact),
                ..
            }) = item
            {
                let slot = versions.entry(artifact.identifier.stem()).or_insert(0);
                *slot = (*slot).max(artifact.identifier.version);
            }
        }

        // Later appends would land behind the torn bytes and be unreadable.
        // A header claiming more bytes than the log holds looks the same
        // as a torn append, so the tail is kept aside before it is cut.
        for (name, offset) in scan.torn_tails() {
            if let Some(backend) = self.volume.open_log(name, false)? {
                let size = backend.size()?;
                let tail = backend.read_at(*offset, size.saturating_sub(*offset) as usize)?;
                let saved = self.volume.quarantine(name, *offset, &tail)?;
                warn!(
                    log = %name,
                    offset,
                    bytes = tail.len(),
                    quarantine = %saved,
                    "truncating torn record at end of log"
                );
                backend.truncate(*offset)?;
            }
        }
        Ok(())
    }

    /// Returns the volume holding the logs.
    #[must_use]
    pub fn volume(&self) -> &Arc<dyn LogVolume> {
        &self.volume
    }

    /// Returns the payload digest algorithm.
    #[must_use]
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Returns the highest version assigned for `stem`, if any.
    #[must_use]
    pub fn latest_version(&self, stem: &ArtifactStem) -> Option<u32> {
        self.versions.lock().get(stem).copied()
    }

    fn log(&self, name: &LogName, create: bool) -> CoreResult<Option<Arc<LogHandle>>> {
        if let Some(handle) = self.logs.read().get(name) {
            return Ok(Some(handle.clone()));
        }
        let Some(backend) = self.volume.open_log(name, create)? else {
            return Ok(None);
        };
        let handle = self
            .logs
            .write()
            .entry(name.clone())
            .or_insert_with(|| {
                Arc::new(LogHandle {
                    backend,
                    writer: Mutex::new(()),
                })
            })
            .clone();
        Ok(Some(handle))
    }

    fn log_for(&self, collection: &str, au_id: &str) -> CoreResult<(LogName, Arc<LogHandle>)> {
        let name = LogName::for_au(collection, au_id)?;
        let handle = self
            .log(&name, true)?
            .ok_or_else(|| CoreError::invalid_argument(format!("cannot create log {name}")))?;
        Ok((name, handle))
    }

    /// Ingests one capture.
    ///
    /// The raw response is spooled through the digest filter, then the
    /// artifact record and its initial uncommitted overlay are appended.
    /// The returned artifact is uncommitted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for bad identity fields (before reading
    /// any content), `InvalidHttpResponse` if the content has no valid
    /// HTTP head, or a storage error if appending fails.
    pub fn ingest<R: Read>(&self, spec: ArtifactSpec<R>) -> CoreResult<Artifact> {
        let ArtifactSpec {
            collection,
            au_id,
            uri,
            version_hint,
            capture_time,
            mut content,
        } = spec;
        let stem = ArtifactStem::new(collection, au_id, uri)?;

        let head = HeadCapture {
            bytes: Vec::new(),
            limit: self.max_http_head_size,
        };
        let mut filter = DigestFilter::new(head, self.algorithm);
        let mut spill = SpillBuffer::new(self.spill_threshold);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = match content.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            filter
                .write_all(&buf[..n])
                .map_err(|e| CoreError::invalid_http(e.to_string()))?;
            spill.write_all(&buf[..n])?;
        }
        if !filter.is_in_payload() {
            return Err(CoreError::invalid_http("response head is not terminated"));
        }
        let content_length = filter.payload_len();
        let (head, content_digest) = filter.finish();
        let http = parse_http_head(&head.bytes)?;

        let capture_time = capture_time.unwrap_or_else(Utc::now).trunc_subsecs(3);
        let id = ArtifactId::new();
        let (log_name, handle) = self.log_for(&stem.collection, &stem.au_id)?;

        let _writer = handle.writer.lock();
        let version = self
            .latest_version(&stem)
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_argument(format!("version space exhausted for {stem}")))?;
        if let Some(hint) = version_hint.filter(|hint| *hint != version) {
            debug!(%stem, hint, version, "ignoring version hint");
        }
        let identifier = stem.clone().with_version(version);

        let header = artifact_header(id, &identifier, capture_time, &content_digest)?;
        let mut writer = RecordWriter::from_spill(header, spill);
        let extent = handle
            .backend
            .append_with(&mut |sink: &mut dyn Write| writer.write_to(sink))?;
        self.versions.lock().insert(stem, version);

        let locator = StorageLocator::new(self.volume.scheme(), log_name, extent.offset, extent.length);
        self.append_overlay_locked(&handle, locator.log(), &identifier, &MetadataOverlay::uncommitted(id))?;
        if self.sync_on_append {
            handle.backend.sync()?;
        }

        debug!(%identifier, %id, bytes = extent.length, "ingested artifact");
        Ok(Artifact {
            id,
            identifier,
            status: http.status,
            headers: http.headers,
            content_length,
            content_digest,
            locator,
            capture_time,
            committed: false,
        })
    }

    /// Appends an overlay record to the log of the artifact it describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is invalid or appending fails.
    pub fn append_metadata(
        &self,
        identifier: &ArtifactIdentifier,
        overlay: &MetadataOverlay,
    ) -> CoreResult<StorageLocator> {
        identifier.stem().validate()?;
        let (name, handle) = self.log_for(&identifier.collection, &identifier.au_id)?;
        let _writer = handle.writer.lock();
        let locator = self.append_overlay_locked(&handle, &name, identifier, overlay)?;
        if self.sync_on_append {
            handle.backend.sync()?;
        }
        Ok(locator)
    }

    fn append_overlay_locked(
        &self,
        handle: &LogHandle,
        name: &LogName,
        identifier: &ArtifactIdentifier,
        overlay: &MetadataOverlay,
    ) -> CoreResult<StorageLocator> {
        let header = metadata_header(identifier, overlay)?;
        let mut writer = RecordWriter::from_bytes(header, overlay.to_json()?);
        let extent = handle
            .backend
            .append_with(&mut |sink: &mut dyn Write| writer.write_to(sink))?;
        Ok(StorageLocator::new(
            self.volume.scheme(),
            name.clone(),
            extent.offset,
            extent.length,
        ))
    }

    fn backend_for(&self, locator: &StorageLocator) -> CoreResult<Arc<LogHandle>> {
        if locator.scheme() != self.volume.scheme() {
            return Err(CoreError::invalid_locator(
                locator.to_string(),
                format!("store serves {} locators", self.volume.scheme()),
            ));
        }
        self.log(locator.log(), false)?
            .ok_or_else(|| CoreError::invalid_locator(locator.to_string(), "no such log"))
    }

    /// Reads the raw bytes of the record at `locator`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLocator` if the locator does not belong to this
    /// store, or a storage error if the read fails.
    pub fn read(&self, locator: &StorageLocator) -> CoreResult<Vec<u8>> {
        let handle = self.backend_for(locator)?;
        let len = usize::try_from(locator.length())
            .map_err(|_| CoreError::invalid_locator(locator.to_string(), "length too large"))?;
        Ok(handle.backend.read_at(locator.offset(), len)?)
    }

    /// Reads an artifact without its body.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or is not an artifact.
    pub fn read_artifact(&self, locator: &StorageLocator) -> CoreResult<Artifact> {
        let handle = self.backend_for(locator)?;
        let mut reader = scan::log_reader(handle.backend.clone())?;
        reader.seek_to(locator.offset())?;
        let head = reader
            .read_head(self.max_http_head_size)?
            .ok_or_else(|| CoreError::invalid_locator(locator.to_string(), "past end of log"))?;
        if head.header.record_type()? != RecordType::Response {
            return Err(CoreError::invalid_record("locator does not address an artifact"));
        }
        decode_artifact(&head.header, &head.preview, head.payload_len(), locator.clone())
    }

    /// Reads an artifact with its body.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or is not an artifact.
    pub fn read_artifact_data(&self, locator: &StorageLocator) -> CoreResult<ArtifactData> {
        let record = Record::decode(&self.read(locator)?)?;
        if record.record_type()? != RecordType::Response {
            return Err(CoreError::invalid_record("locator does not address an artifact"));
        }
        let (header, payload) = record.into_parts();
        let artifact = decode_artifact(&header, &payload, payload.len() as u64, locator.clone())?;
        let body_start = payload.len() - artifact.content_length as usize;
        Ok(ArtifactData {
            artifact,
            body: payload.slice(body_start..),
        })
    }

    /// Reads the overlay at `locator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or is not an overlay.
    pub fn read_metadata(&self, locator: &StorageLocator) -> CoreResult<MetadataOverlay> {
        let record = Record::decode(&self.read(locator)?)?;
        if record.record_type()? != RecordType::Metadata {
            return Err(CoreError::invalid_record("locator does not address an overlay"));
        }
        decode_metadata(record.header(), record.payload())
    }

    /// Returns a lazy scan over every record in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs cannot be listed.
    pub fn scan(&self) -> CoreResult<StoreScan> {
        StoreScan::new(self.volume.clone(), self.max_http_head_size)
    }

    /// Syncs every open log to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if any sync fails; the remaining logs are still
    /// attempted.
    pub fn sync(&self) -> CoreResult<()> {
        let handles: Vec<Arc<LogHandle>> = self.logs.read().values().cloned().collect();
        let mut first_error = None;
        for handle in handles {
            if let Err(e) = handle.backend.sync() {
                warn!(error = %e, "log sync failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("volume", &self.volume.describe())
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
