//! Repository facade and index rebuild.

use crate::artifact::{Artifact, ArtifactData, ArtifactSpec};
use crate::cdx::{CdxRecord, CdxRecords, NearestResolver};
use crate::config::{Config, StorageKind};
use crate::error::{CoreError, CoreResult};
use crate::index::{ArtifactIndex, ArtifactPredicate, EntryIter, IndexEntry, VolatileIndex};
use crate::metadata::{MetadataOverlay, OverlayState};
use crate::stats::{RepositoryStats, StatsSnapshot};
use crate::store::{ArtifactStore, DirectoryVolume, InMemoryVolume, LogVolume, ScannedRecord, StoredRecord};
use crate::types::{validate_au_id, validate_collection, ArtifactId, ArtifactStem};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of replaying the store into the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Artifact records indexed.
    pub artifacts: u64,
    /// Overlay records replayed.
    pub overlays: u64,
    /// Entries committed after the replay.
    pub committed: u64,
    /// Entries removed by delete overlays.
    pub deleted: u64,
    /// Records that could not be decoded.
    pub corrupt_records: u64,
    /// Overlays naming an artifact the index does not hold.
    pub orphan_overlays: u64,
}

impl RebuildReport {
    /// Returns the number of records ignored by the replay.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.corrupt_records + self.orphan_overlays
    }
}

/// The main repository handle.
///
/// A repository pairs the append-only [`ArtifactStore`], which is the
/// source of truth, with an [`ArtifactIndex`] that caches what the store
/// says. Every visibility change is appended to the store before the
/// index is touched, so replaying the store always reproduces the index.
///
/// # Lifecycle
///
/// ```rust,ignore
/// use arcvault_core::{ArtifactSpec, Config, Repository};
///
/// let repo = Repository::open(Config::directory("/srv/arcvault"))?;
/// let artifact = repo.ingest(ArtifactSpec::new("web", "au1", "http://example.com/", response))?;
/// assert!(repo.latest_artifact("web", "au1", "http://example.com/", false)?.is_none());
///
/// repo.commit(&artifact.id)?;
/// assert!(repo.latest_artifact("web", "au1", "http://example.com/", false)?.is_some());
/// ```
///
/// Reads through the index never see uncommitted or deleted artifacts
/// unless they ask for uncommitted ones explicitly.
pub struct Repository {
    config: Config,
    store: ArtifactStore,
    index: Arc<dyn ArtifactIndex>,
    stats: RepositoryStats,
    /// Shared by mutations, exclusive during rebuild.
    maintenance: RwLock<()>,
}

impl Repository {
    /// Opens a repository as described by `config`.
    ///
    /// The index is rebuilt from the store before this returns, so no
    /// read is ever served from a partially rebuilt index.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDigestAlgorithm` for an unknown algorithm,
    /// `RepositoryLocked` if another handle holds the directory, or an
    /// I/O error if the logs cannot be read.
    pub fn open(config: Config) -> CoreResult<Self> {
        let volume: Arc<dyn LogVolume> = match &config.storage {
            StorageKind::Volatile => Arc::new(InMemoryVolume::new()),
            StorageKind::Directory(path) => {
                Arc::new(DirectoryVolume::open(path, config.create_if_missing)?)
            }
        };
        Self::with_parts(volume, Arc::new(VolatileIndex::new()), config)
    }

    /// Opens an empty in-memory repository.
    ///
    /// # Errors
    ///
    /// Returns an error only if the default configuration is rejected.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Config::volatile())
    }

    /// Opens a repository over an existing volume and index.
    ///
    /// The index contents are replaced by a rebuild from the volume.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn with_parts(
        volume: Arc<dyn LogVolume>,
        index: Arc<dyn ArtifactIndex>,
        config: Config,
    ) -> CoreResult<Self> {
        let store = ArtifactStore::open(volume, &config)?;
        let repo = Self {
            config,
            store,
            index,
            stats: RepositoryStats::new(),
            maintenance: RwLock::new(()),
        };
        let report = repo.rebuild()?;
        info!(
            volume = %repo.store.volume().describe(),
            artifacts = report.artifacts,
            committed = report.committed,
            skipped = report.skipped(),
            "repository opened"
        );
        Ok(repo)
    }

    /// Returns the configuration the repository was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Returns the index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn ArtifactIndex> {
        &self.index
    }

    /// Returns a snapshot of the repository counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Ingests one capture as a new, uncommitted version.
    ///
    /// # Errors
    ///
    /// See [`ArtifactStore::ingest`].
    pub fn ingest<R: Read>(&self, spec: ArtifactSpec<R>) -> CoreResult<Artifact> {
        let _shared = self.maintenance.read();
        let artifact = self.store.ingest(spec)?;
        self.index.index_artifact(&artifact)?;
        self.stats.record_ingest(artifact.locator.length());
        Ok(artifact)
    }

    /// Makes an artifact visible.
    ///
    /// Returns `None` if the id is unknown. Committing an already
    /// committed artifact returns it without writing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay cannot be appended. The index is
    /// left unchanged in that case.
    pub fn commit(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>> {
        let _shared = self.maintenance.read();
        let Some(entry) = self.index.get(id)? else {
            return Ok(None);
        };
        if entry.committed {
            return Ok(Some(entry));
        }
        self.store
            .append_metadata(&entry.identifier, &MetadataOverlay::committed(*id))?;
        let committed = self.index.commit(id)?;
        if committed.is_some() {
            self.stats.record_commit();
            debug!(%id, identifier = %entry.identifier, "committed artifact");
        }
        Ok(committed)
    }

    /// Deletes an artifact, returning whether it existed.
    ///
    /// The bytes stay in the log; only the artifact's visibility is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay cannot be appended. The index is
    /// left unchanged in that case.
    pub fn delete(&self, id: &ArtifactId) -> CoreResult<bool> {
        let _shared = self.maintenance.read();
        let Some(entry) = self.index.get(id)? else {
            return Ok(false);
        };
        self.store
            .append_metadata(&entry.identifier, &MetadataOverlay::deleted(*id))?;
        let removed = self.index.delete(id)?;
        if removed {
            self.stats.record_delete();
            debug!(%id, identifier = %entry.identifier, "deleted artifact");
        }
        Ok(removed)
    }

    /// Rebuilds the index from the store.
    ///
    /// The first pass indexes every artifact record as uncommitted; the
    /// second replays every overlay in append order, so the last overlay
    /// for an artifact decides its state. Damaged records and overlays
    /// for unknown artifacts are logged and counted, never fatal.
    ///
    /// The replay runs against a staging index that replaces the live
    /// entries in one step. Readers keep seeing the previous contents
    /// until then; mutations wait for the rebuild to finish.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures while reading the logs. The
    /// live index is left untouched in that case.
    pub fn rebuild(&self) -> CoreResult<RebuildReport> {
        let _exclusive = self.maintenance.write();
        let staging = VolatileIndex::new();
        let mut report = RebuildReport::default();

        for item in self.store.scan()? {
            match item {
                Ok(ScannedRecord {
                    record: StoredRecord::Artifact(artifact),
                    ..
                }) => {
                    staging.index_artifact(&artifact)?;
                    report.artifacts += 1;
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable record");
                    report.corrupt_records += 1;
                }
            }
        }

        for item in self.store.scan()? {
            match item {
                Ok(ScannedRecord {
                    record: StoredRecord::Metadata(overlay),
                    locator,
                }) => {
                    report.overlays += 1;
                    let id = overlay.artifact_id;
                    let applied = match overlay.state() {
                        OverlayState::Deleted => {
                            let removed = staging.delete(&id)?;
                            report.deleted += u64::from(removed);
                            removed
                        }
                        OverlayState::Committed => staging.commit(&id)?.is_some(),
                        OverlayState::Uncommitted => staging.uncommit(&id)?.is_some(),
                    };
                    if !applied {
                        warn!(%id, %locator, "overlay for unknown artifact");
                        report.orphan_overlays += 1;
                    }
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => return Err(e),
                // Counted by the first pass.
                Err(_) => {}
            }
        }

        let entries = staging.entries();
        report.committed = entries.iter().filter(|entry| entry.committed).count() as u64;
        self.index.replace(entries)?;
        self.stats.record_rebuild(report.skipped());
        info!(
            artifacts = report.artifacts,
            overlays = report.overlays,
            committed = report.committed,
            corrupt = report.corrupt_records,
            orphans = report.orphan_overlays,
            "index rebuilt"
        );
        Ok(report)
    }

    /// Syncs every log to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if any log fails to sync.
    pub fn sync(&self) -> CoreResult<()> {
        self.store.sync()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns the index entry for `id`, committed or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn get_entry(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>> {
        self.index.get(id)
    }

    /// Returns the artifact for `id`, without its body.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact record cannot be read.
    pub fn get_artifact(&self, id: &ArtifactId) -> CoreResult<Option<Artifact>> {
        self.index
            .get(id)?
            .map(|entry| self.load_artifact(&entry))
            .transpose()
    }

    /// Returns the artifact for `id` together with its body.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact record cannot be read.
    pub fn get_artifact_data(&self, id: &ArtifactId) -> CoreResult<Option<ArtifactData>> {
        let Some(entry) = self.index.get(id)? else {
            return Ok(None);
        };
        let mut data = self.store.read_artifact_data(&entry.locator)?;
        data.artifact.committed = entry.committed;
        Ok(Some(data))
    }

    /// Returns whether `id` is committed, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn is_committed(&self, id: &ArtifactId) -> CoreResult<Option<bool>> {
        Ok(self.index.get(id)?.map(|entry| entry.committed))
    }

    /// Returns one specific version of a URI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identity fields.
    pub fn artifact_version(
        &self,
        collection: &str,
        au_id: &str,
        uri: &str,
        version: u32,
        include_uncommitted: bool,
    ) -> CoreResult<Option<IndexEntry>> {
        let predicate = Self::uri_predicate(collection, au_id, uri, include_uncommitted)?.version(version);
        Ok(self.index.query(&predicate)?.next())
    }

    /// Returns the newest version of a URI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identity fields.
    pub fn latest_artifact(
        &self,
        collection: &str,
        au_id: &str,
        uri: &str,
        include_uncommitted: bool,
    ) -> CoreResult<Option<IndexEntry>> {
        let predicate = Self::uri_predicate(collection, au_id, uri, include_uncommitted)?;
        Ok(self.index.query(&predicate)?.next())
    }

    /// Returns every committed version of a URI, newest first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty identity fields.
    pub fn artifact_versions(&self, collection: &str, au_id: &str, uri: &str) -> CoreResult<EntryIter> {
        self.index
            .query(&Self::uri_predicate(collection, au_id, uri, false)?)
    }

    /// Returns the newest committed version of every URI in an AU that
    /// starts with `prefix`, in URI order.
    ///
    /// An empty prefix lists the whole AU.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection or AU.
    pub fn artifacts_with_prefix(&self, collection: &str, au_id: &str, prefix: &str) -> CoreResult<EntryIter> {
        validate_collection(collection)?;
        validate_au_id(au_id)?;
        let predicate = ArtifactPredicate::new()
            .collection(collection)
            .au_id(au_id)
            .uri_prefix(prefix)
            .committed(true);
        let mut previous: Option<String> = None;
        let latest = self.index.query(&predicate)?.filter(move |entry| {
            if previous.as_deref() == Some(entry.identifier.uri.as_str()) {
                return false;
            }
            previous = Some(entry.identifier.uri.clone());
            true
        });
        Ok(Box::new(latest))
    }

    /// Returns every committed version of every URI starting with
    /// `prefix`, across all AUs of a collection.
    ///
    /// Ordered by URI, then newest version first, then AU.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection.
    pub fn artifacts_with_url_prefix_all_aus(&self, collection: &str, prefix: &str) -> CoreResult<Vec<IndexEntry>> {
        validate_collection(collection)?;
        let predicate = ArtifactPredicate::new()
            .collection(collection)
            .uri_prefix(prefix)
            .committed(true);
        let mut entries: Vec<IndexEntry> = self.index.query(&predicate)?.collect();
        entries.sort_by(|a, b| {
            let (a, b) = (&a.identifier, &b.identifier);
            (&a.uri, Reverse(a.version), &a.au_id).cmp(&(&b.uri, Reverse(b.version), &b.au_id))
        });
        Ok(entries)
    }

    /// Lists collections holding committed artifacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn list_collections(&self) -> CoreResult<Vec<String>> {
        self.index.list_collections()
    }

    /// Lists AUs of `collection` holding committed artifacts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection.
    pub fn list_aus(&self, collection: &str) -> CoreResult<Vec<String>> {
        validate_collection(collection)?;
        self.index.list_aus(collection)
    }

    /// Returns the total body size of the newest committed version of
    /// each URI in an AU.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection or AU.
    pub fn au_size(&self, collection: &str, au_id: &str) -> CoreResult<u64> {
        Ok(self
            .artifacts_with_prefix(collection, au_id, "")?
            .map(|entry| entry.content_length)
            .sum())
    }

    /// Runs an arbitrary index query.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn query(&self, predicate: &ArtifactPredicate) -> CoreResult<EntryIter> {
        self.index.query(predicate)
    }

    // ========================================================================
    // CDX
    // ========================================================================

    /// Returns CDX records for the committed captures of one URL across
    /// all AUs of a collection, nearest to `target` first.
    ///
    /// Without a target, newest version first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection or empty URL,
    /// or an error if an artifact record cannot be read.
    pub fn cdx_for_url(
        &self,
        collection: &str,
        url: &str,
        target: Option<DateTime<Utc>>,
    ) -> CoreResult<CdxRecords> {
        validate_collection(collection)?;
        if url.is_empty() {
            return Err(CoreError::invalid_argument("url must not be empty"));
        }
        let predicate = ArtifactPredicate::new()
            .collection(collection)
            .uri(url)
            .committed(true);
        let mut entries: Vec<IndexEntry> = self.index.query(&predicate)?.collect();
        entries.sort_by_key(|entry| Reverse(entry.identifier.version));
        self.cdx_records(NearestResolver::new(target).resolve(entries))
    }

    /// Returns CDX records for every committed capture whose URL starts
    /// with `prefix`, grouped by URL in sort-key order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid collection, or an error if
    /// an artifact record cannot be read.
    pub fn cdx_for_prefix(
        &self,
        collection: &str,
        prefix: &str,
        target: Option<DateTime<Utc>>,
    ) -> CoreResult<CdxRecords> {
        let entries = self.artifacts_with_url_prefix_all_aus(collection, prefix)?;
        self.cdx_records(NearestResolver::new(target).resolve_grouped(entries))
    }

    fn cdx_records(&self, entries: Vec<IndexEntry>) -> CoreResult<CdxRecords> {
        let records = entries
            .iter()
            .map(|entry| Ok(CdxRecord::from_artifact(&self.load_artifact(entry)?)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(CdxRecords::new(records))
    }

    fn load_artifact(&self, entry: &IndexEntry) -> CoreResult<Artifact> {
        let mut artifact = self.store.read_artifact(&entry.locator)?;
        artifact.committed = entry.committed;
        Ok(artifact)
    }

    fn uri_predicate(
        collection: &str,
        au_id: &str,
        uri: &str,
        include_uncommitted: bool,
    ) -> CoreResult<ArtifactPredicate> {
        let stem = ArtifactStem::new(collection, au_id, uri)?;
        let predicate = ArtifactPredicate::new()
            .collection(stem.collection)
            .au_id(stem.au_id)
            .uri(stem.uri);
        Ok(if include_uncommitted {
            predicate
        } else {
            predicate.committed(true)
        })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn response(body: &str) -> Cursor<Vec<u8>> {
        Cursor::new(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            )
            .into_bytes(),
        )
    }

    fn ingest(repo: &Repository, au: &str, uri: &str, body: &str) -> Artifact {
        repo.ingest(ArtifactSpec::new("web", au, uri, response(body)))
            .unwrap()
    }

    #[test]
    fn ingested_artifacts_are_hidden_until_committed() {
        let repo = Repository::open_in_memory().unwrap();
        let a = ingest(&repo, "au", "http://a/", "one");

        assert_eq!(repo.is_committed(&a.id).unwrap(), Some(false));
        assert!(repo.latest_artifact("web", "au", "http://a/", false).unwrap().is_none());
        assert!(repo.latest_artifact("web", "au", "http://a/", true).unwrap().is_some());
        assert!(repo.list_collections().unwrap().is_empty());

        let entry = repo.commit(&a.id).unwrap().unwrap();
        assert!(entry.committed);
        assert_eq!(repo.list_collections().unwrap(), vec!["web"]);
        assert_eq!(repo.stats().committed, 1);
    }

    #[test]
    fn commit_twice_writes_one_overlay() {
        let repo = Repository::open_in_memory().unwrap();
        let a = ingest(&repo, "au", "http://a/", "one");
        repo.commit(&a.id).unwrap();
        let overlays_before = repo.store().scan().unwrap().count();
        repo.commit(&a.id).unwrap();
        assert_eq!(repo.store().scan().unwrap().count(), overlays_before);
        assert_eq!(repo.stats().committed, 1);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let repo = Repository::open_in_memory().unwrap();
        let id = ArtifactId::new();
        assert!(repo.commit(&id).unwrap().is_none());
        assert!(!repo.delete(&id).unwrap());
        assert!(repo.get_artifact(&id).unwrap().is_none());
        assert_eq!(repo.is_committed(&id).unwrap(), None);
        assert_eq!(repo.store().scan().unwrap().count(), 0);
    }

    #[test]
    fn delete_hides_artifact() {
        let repo = Repository::open_in_memory().unwrap();
        let a = ingest(&repo, "au", "http://a/", "one");
        repo.commit(&a.id).unwrap();
        assert!(repo.delete(&a.id).unwrap());

        assert!(repo.get_entry(&a.id).unwrap().is_none());
        assert!(repo.latest_artifact("web", "au", "http://a/", true).unwrap().is_none());
        assert!(repo.list_collections().unwrap().is_empty());
    }

    #[test]
    fn get_artifact_data_returns_body() {
        let repo = Repository::open_in_memory().unwrap();
        let a = ingest(&repo, "au", "http://a/", "hello world");
        repo.commit(&a.id).unwrap();

        let data = repo.get_artifact_data(&a.id).unwrap().unwrap();
        assert_eq!(&data.body[..], b"hello world");
        assert!(data.artifact.committed);
        assert_eq!(data.artifact.mime_type(), Some("text/html"));
    }

    #[test]
    fn prefix_listing_takes_latest_per_uri() {
        let repo = Repository::open_in_memory().unwrap();
        for (uri, body) in [("http://a/1", "x"), ("http://a/1", "xyz"), ("http://a/2", "ab"), ("http://b/", "q")] {
            let art = ingest(&repo, "au", uri, body);
            repo.commit(&art.id).unwrap();
        }
        // Uncommitted newer version is ignored.
        ingest(&repo, "au", "http://a/2", "uncommitted");

        let latest: Vec<(String, u32)> = repo
            .artifacts_with_prefix("web", "au", "http://a/")
            .unwrap()
            .map(|e| (e.identifier.uri, e.identifier.version))
            .collect();
        assert_eq!(latest, vec![("http://a/1".to_string(), 2), ("http://a/2".to_string(), 1)]);
        assert_eq!(repo.au_size("web", "au").unwrap(), 3 + 2 + 1);
    }

    #[test]
    fn invalid_identity_rejected_before_io() {
        let repo = Repository::open_in_memory().unwrap();
        assert!(matches!(
            repo.latest_artifact("", "au", "http://a/", false),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            repo.artifacts_with_prefix("web", "", "http://"),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn rebuild_reproduces_index() {
        let repo = Repository::open_in_memory().unwrap();
        let a = ingest(&repo, "au", "http://a/", "one");
        let b = ingest(&repo, "au", "http://b/", "two");
        let c = ingest(&repo, "au2", "http://c/", "three");
        repo.commit(&a.id).unwrap();
        repo.commit(&c.id).unwrap();
        repo.delete(&c.id).unwrap();

        let before: Vec<IndexEntry> = repo.query(&ArtifactPredicate::new().collection("web")).unwrap().collect();
        let report = repo.rebuild().unwrap();
        let after: Vec<IndexEntry> = repo.query(&ArtifactPredicate::new().collection("web")).unwrap().collect();

        assert_eq!(before, after);
        assert_eq!(report.artifacts, 3);
        assert_eq!(report.committed, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.skipped(), 0);
        assert!(!repo.is_committed(&b.id).unwrap().unwrap());
    }

    #[test]
    fn cdx_for_url_spans_aus() {
        let repo = Repository::open_in_memory().unwrap();
        for au in ["au1", "au2"] {
            let art = ingest(&repo, au, "http://example.com/", "page");
            repo.commit(&art.id).unwrap();
        }
        let records = repo.cdx_for_url("web", "http://example.com/", None).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records.records()[0];
        assert_eq!(first.url_sort_key, "com,example)/");
        assert_eq!(first.mime_type, "text/html");
        assert_eq!(first.status, 200);
        assert_eq!(first.length, 4);
        assert_eq!(first.archive_name, "artifacts.warc");
    }
}
