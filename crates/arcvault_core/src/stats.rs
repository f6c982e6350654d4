//! Repository statistics.
//!
//! Counters are updated by the repository as it works and can be read at
//! any time, including while other threads ingest.
//!
//! ```rust,ignore
//! let repo = Repository::open(Config::volatile())?;
//! repo.ingest(spec)?;
//! let snap = repo.stats();
//! println!("ingested {} ({} bytes)", snap.ingested, snap.bytes_written);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live repository counters.
///
/// All counters are monotonically increasing for the lifetime of the
/// repository handle. They are not persisted.
#[derive(Debug, Default)]
pub struct RepositoryStats {
    ingested: AtomicU64,
    committed: AtomicU64,
    deleted: AtomicU64,
    bytes_written: AtomicU64,
    records_skipped: AtomicU64,
    rebuilds: AtomicU64,
}

impl RepositoryStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ingest(&self, bytes: u64) {
        self.ingested.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self, skipped: u64) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.records_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Returns the number of artifacts ingested.
    pub fn ingested(&self) -> u64 {
        self.ingested.load(Ordering::Relaxed)
    }

    /// Returns the number of commits that changed state.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of deletes that removed an artifact.
    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    /// Returns the number of artifact record bytes appended.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of records skipped by rebuilds.
    ///
    /// Includes corrupt records and overlays whose artifact is unknown.
    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    /// Returns the number of rebuilds run.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ingested: self.ingested(),
            committed: self.committed(),
            deleted: self.deleted(),
            bytes_written: self.bytes_written(),
            records_skipped: self.records_skipped(),
            rebuilds: self.rebuilds(),
        }
    }
}

/// A point-in-time copy of [`RepositoryStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Artifacts ingested.
    pub ingested: u64,
    /// Commits that changed state.
    pub committed: u64,
    /// Deletes that removed an artifact.
    pub deleted: u64,
    /// Artifact record bytes appended.
    pub bytes_written: u64,
    /// Records skipped by rebuilds.
    pub records_skipped: u64,
    /// Rebuilds run.
    pub rebuilds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = RepositoryStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = RepositoryStats::new();
        stats.record_ingest(100);
        stats.record_ingest(50);
        stats.record_commit();
        stats.record_delete();
        stats.record_rebuild(3);

        let snap = stats.snapshot();
        assert_eq!(snap.ingested, 2);
        assert_eq!(snap.bytes_written, 150);
        assert_eq!(snap.committed, 1);
        assert_eq!(snap.deleted, 1);
        assert_eq!(snap.records_skipped, 3);
        assert_eq!(snap.rebuilds, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(RepositoryStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_ingest(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.ingested(), 800);
        assert_eq!(stats.bytes_written(), 800);
    }
}
