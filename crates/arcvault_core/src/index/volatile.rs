//! In-memory artifact index.

use super::{ArtifactIndex, ArtifactPredicate, EntryIter, IndexEntry};
use crate::artifact::Artifact;
use crate::error::CoreResult;
use crate::types::ArtifactId;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

/// Sort key: collection, AU, URI, then newest version first.
type Key = (String, String, String, Reverse<u32>);

/// Matches gathered per lock acquisition.
const BATCH_SIZE: usize = 64;
/// Entries examined per lock acquisition.
const VISIT_LIMIT: usize = 1024;

fn key_of(entry: &IndexEntry) -> Key {
    let id = &entry.identifier;
    (
        id.collection.clone(),
        id.au_id.clone(),
        id.uri.clone(),
        Reverse(id.version),
    )
}

#[derive(Default)]
struct Entries {
    by_key: BTreeMap<Key, IndexEntry>,
    keys: HashMap<ArtifactId, Key>,
}

impl Entries {
    fn insert(&mut self, entry: IndexEntry) {
        let key = key_of(&entry);
        if let Some(old) = self.keys.insert(entry.id, key.clone()) {
            self.by_key.remove(&old);
        }
        if let Some(displaced) = self.by_key.insert(key, entry.clone()) {
            if displaced.id != entry.id {
                self.keys.remove(&displaced.id);
            }
        }
    }

    fn set_committed(&mut self, id: &ArtifactId, committed: bool) -> Option<IndexEntry> {
        self.get_mut(id).map(|entry| {
            entry.committed = committed;
            entry.clone()
        })
    }

    fn get_mut(&mut self, id: &ArtifactId) -> Option<&mut IndexEntry> {
        let key = self.keys.get(id)?;
        self.by_key.get_mut(key)
    }
}

/// An index held entirely in memory.
///
/// Entries are kept in a `BTreeMap` ordered by collection, AU, URI and
/// descending version, behind a `parking_lot::RwLock`. The write lock is
/// taken only for structural changes; lookups share the read lock.
///
/// # Example
///
/// ```rust,ignore
/// let index = VolatileIndex::new();
/// index.index_artifact(&artifact)?;
/// index.commit(&artifact.id)?;
/// assert!(index.get(&artifact.id)?.unwrap().committed);
/// ```
#[derive(Default, Clone)]
pub struct VolatileIndex {
    entries: Arc<RwLock<Entries>>,
}

impl VolatileIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.entries.read().by_key.values().cloned().collect()
    }
}

impl ArtifactIndex for VolatileIndex {
    fn index_artifact(&self, artifact: &Artifact) -> CoreResult<IndexEntry> {
        let entry = IndexEntry::from(artifact);
        self.entries.write().insert(entry.clone());
        Ok(entry)
    }

    fn get(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .keys
            .get(id)
            .and_then(|key| entries.by_key.get(key))
            .cloned())
    }

    fn commit(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>> {
        Ok(self.entries.write().set_committed(id, true))
    }

    fn uncommit(&self, id: &ArtifactId) -> CoreResult<Option<IndexEntry>> {
        Ok(self.entries.write().set_committed(id, false))
    }

    fn delete(&self, id: &ArtifactId) -> CoreResult<bool> {
        let mut entries = self.entries.write();
        match entries.keys.remove(id) {
            Some(key) => Ok(entries.by_key.remove(&key).is_some()),
            None => Ok(false),
        }
    }

    fn exists(&self, id: &ArtifactId) -> CoreResult<bool> {
        Ok(self.entries.read().keys.contains_key(id))
    }

    fn list_collections(&self) -> CoreResult<Vec<String>> {
        let entries = self.entries.read();
        let collections: BTreeSet<&str> = entries
            .by_key
            .values()
            .filter(|e| e.committed)
            .map(|e| e.identifier.collection.as_str())
            .collect();
        Ok(collections.into_iter().map(str::to_string).collect())
    }

    fn list_aus(&self, collection: &str) -> CoreResult<Vec<String>> {
        let entries = self.entries.read();
        let start = (
            collection.to_string(),
            String::new(),
            String::new(),
            Reverse(u32::MAX),
        );
        let aus: BTreeSet<&str> = entries
            .by_key
            .range(start..)
            .take_while(|(key, _)| key.0 == collection)
            .filter(|(_, e)| e.committed)
            .map(|(key, _)| key.1.as_str())
            .collect();
        Ok(aus.into_iter().map(str::to_string).collect())
    }

    fn query(&self, predicate: &ArtifactPredicate) -> CoreResult<EntryIter> {
        if predicate.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        Ok(Box::new(IndexCursor::new(
            self.entries.clone(),
            predicate.clone(),
        )))
    }

    fn replace(&self, entries: Vec<IndexEntry>) -> CoreResult<()> {
        let mut fresh = Entries::default();
        for entry in entries {
            fresh.insert(entry);
        }
        *self.entries.write() = fresh;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().keys.len()
    }
}

/// A lazy, resumable walk over a [`VolatileIndex`].
///
/// The cursor holds no lock between steps. Each refill takes the read
/// lock briefly and resumes after the last key it saw, so entries added
/// or removed behind the cursor do not disturb it and writers are never
/// held up by a slow consumer.
pub struct IndexCursor {
    entries: Arc<RwLock<Entries>>,
    predicate: ArtifactPredicate,
    start: Key,
    last: Option<Key>,
    buffer: VecDeque<IndexEntry>,
    done: bool,
}

impl IndexCursor {
    fn new(entries: Arc<RwLock<Entries>>, predicate: ArtifactPredicate) -> Self {
        let collection = predicate.fixed_collection();
        let au = collection.and(predicate.fixed_au());
        let uri = au.and(predicate.uri_lower_bound());
        let start = (
            collection.unwrap_or_default().to_string(),
            au.unwrap_or_default().to_string(),
            uri.unwrap_or_default().to_string(),
            Reverse(u32::MAX),
        );
        Self {
            entries,
            predicate,
            start,
            last: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Returns false once `key` lies past every possible match.
    fn in_range(&self, key: &Key) -> bool {
        let Some(collection) = self.predicate.fixed_collection() else {
            return true;
        };
        if key.0 != collection {
            return false;
        }
        let Some(au) = self.predicate.fixed_au() else {
            return true;
        };
        if key.1 != au {
            return false;
        }
        match self.predicate.uri_lower_bound() {
            Some(prefix) => key.2.starts_with(prefix),
            None => true,
        }
    }

    fn fill(&mut self) {
        let shared = Arc::clone(&self.entries);
        let entries = shared.read();
        let lower = match &self.last {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Included(self.start.clone()),
        };

        let mut visited = 0;
        for (key, entry) in entries.by_key.range((lower, Bound::Unbounded)) {
            if !self.in_range(key) {
                self.done = true;
                return;
            }
            self.last = Some(key.clone());
            if self.predicate.matches(entry) {
                self.buffer.push_back(entry.clone());
            }
            visited += 1;
            if self.buffer.len() >= BATCH_SIZE || visited >= VISIT_LIMIT {
                return;
            }
        }
        self.done = true;
    }
}

impl Iterator for IndexCursor {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }
            if self.done {
                return None;
            }
            self.fill();
        }
    }
}
