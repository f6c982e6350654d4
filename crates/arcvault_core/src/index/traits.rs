//! Index entry and index trait.

use super::ArtifactPredicate;
use crate::artifact::Artifact;
use crate::digest::ContentDigest;
use crate::error::CoreResult;
use crate::locator::StorageLocator;
use crate::types::{ArtifactId, ArtifactIdentifier};
use chrono::{DateTime, Utc};

/// What the index knows about one artifact.
///
/// Every field is derivable from the store, so an index can always be
/// rebuilt from the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Artifact id.
    pub id: ArtifactId,
    /// Collection, AU, URI and version.
    pub identifier: ArtifactIdentifier,
    /// Whether the artifact is visible to readers.
    pub committed: bool,
    /// Where the artifact record is stored.
    pub locator: StorageLocator,
    /// Length of the HTTP body.
    pub content_length: u64,
    /// Digest of the HTTP body.
    pub content_digest: ContentDigest,
    /// Capture time.
    pub capture_time: DateTime<Utc>,
}

impl From<&Artifact> for IndexEntry {
    fn from(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id,
            identifier: artifact.identifier.clone(),
            committed: artifact.committed,
            locator: artifact.locator.clone(),
            content_length: artifact.content_length,
            content_digest: artifact.content_digest.clone(),
            capture_time: artifact.capture_time,
        }
    }
}

/// A lazy sequence of index entries.
pub type EntryIter = Box<dyn Iterator<Item = IndexEntry> + Send>;

/// A secondary index over artifacts.
///
/// The index is a cache of the store. Implementations decide where the
/// entries live; the repository keeps them consistent by replaying the
/// store's overlays.
pub trait ArtifactIndex: Send + Sync {
    /// Adds or replaces the entry for `artifact`, keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn index_artifact(&self, artifact: &Artifact) -> CoreResult<IndexEntry>;

    /// Looks up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn get(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>>;

    /// Marks an entry committed, returning it.
    ///
    /// Returns `None` without error if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn commit(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>>;

    /// Marks an entry uncommitted, returning it.
    ///
    /// Returns `None` without error if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn uncommit(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>>;

    /// Removes an entry, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn delete(&self, id: &ArtifactId) -> CoreResult<bool>;

    /// Returns true if an entry exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn exists(&self, id: &ArtifactId) -> CoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Lists collections with at least one committed entry, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn list_collections(&self) -> CoreResult<Vec<String>>;

    /// Lists AUs of `collection` with at least one committed entry, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn list_aus(&self, collection: &str) -> CoreResult<Vec<String>>;

    /// Returns the entries matching `predicate`, ordered by collection,
    /// AU and URI, newest version first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn query(&self, predicate: &ArtifactPredicate) -> CoreResult<EntryIter>;

    /// Replaces every entry with `entries` in one step.
    ///
    /// Readers see either the old contents or the new ones, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn replace(&self, entries: Vec<IndexEntry>) -> CoreResult<()>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    fn clear(&self) -> CoreResult<()> {
        self.replace(Vec::new())
    }

    /// Returns the number of entries, committed or not.
    fn len(&self) -> usize;

    /// Returns true if the index has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
