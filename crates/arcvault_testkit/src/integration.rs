//! Cross-crate integration test helpers.
//!
//! [`IntegrationHarness`] drives a repository while keeping its own model
//! of what every artifact's state should be, so tests can check the
//! repository (and a rebuilt index) against the model at any point.

use crate::fixtures::{http_response, TestRepository};
use crate::generators::RepositoryOperation;
use arcvault_core::{ArtifactId, ArtifactPredicate, ArtifactSpec, MetadataOverlay, Repository};
use std::collections::HashMap;
use std::io::Cursor;

/// Expected state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedState {
    /// Ingested, not visible.
    Uncommitted,
    /// Visible.
    Committed,
    /// Gone.
    Deleted,
}

/// A test harness that mirrors repository state in a simple model.
pub struct IntegrationHarness {
    /// The repository under test.
    pub repo: TestRepository,
    ingested: Vec<ArtifactId>,
    expected: HashMap<ArtifactId, ExpectedState>,
    next_version: HashMap<String, u32>,
}

impl IntegrationHarness {
    /// Creates a harness over an in-memory repository.
    pub fn new() -> Self {
        Self::with_repository(TestRepository::memory())
    }

    /// Creates a harness over a directory repository.
    pub fn on_disk() -> Self {
        Self::with_repository(TestRepository::directory())
    }

    fn with_repository(repo: TestRepository) -> Self {
        Self {
            repo,
            ingested: Vec::new(),
            expected: HashMap::new(),
            next_version: HashMap::new(),
        }
    }

    /// Ingests a page and checks the assigned version.
    pub fn ingest(&mut self, uri: &str, body: &[u8]) -> ArtifactId {
        let raw = http_response(200, "OK", &[("Content-Type", "text/plain")], body);
        let artifact = self
            .repo
            .ingest(ArtifactSpec::new("web", "au", uri, Cursor::new(raw)))
            .expect("Failed to ingest");

        let version = self.next_version.entry(uri.to_string()).or_insert(0);
        *version += 1;
        assert_eq!(artifact.identifier.version, *version, "version for {uri}");

        self.ingested.push(artifact.id);
        self.expected.insert(artifact.id, ExpectedState::Uncommitted);
        artifact.id
    }

    /// Commits an artifact and updates the model.
    pub fn commit(&mut self, id: ArtifactId) {
        let entry = self.repo.commit(&id).expect("Failed to commit");
        match self.expected.get_mut(&id) {
            Some(state @ (ExpectedState::Uncommitted | ExpectedState::Committed)) => {
                assert!(entry.is_some_and(|e| e.committed), "commit of live artifact");
                *state = ExpectedState::Committed;
            }
            _ => assert!(entry.is_none(), "commit of missing artifact"),
        }
    }

    /// Deletes an artifact and updates the model.
    pub fn delete(&mut self, id: ArtifactId) {
        let removed = self.repo.delete(&id).expect("Failed to delete");
        match self.expected.get_mut(&id) {
            Some(state @ (ExpectedState::Uncommitted | ExpectedState::Committed)) => {
                assert!(removed, "delete of live artifact");
                *state = ExpectedState::Deleted;
            }
            _ => assert!(!removed, "delete of missing artifact"),
        }
    }

    /// Appends an uncommitted overlay for a live artifact straight to the
    /// store, mirroring it into the index the way the repository would.
    pub fn withdraw(&mut self, id: ArtifactId) {
        let Some(state) = self.expected.get_mut(&id) else {
            return;
        };
        if *state == ExpectedState::Deleted {
            return;
        }
        let entry = self
            .repo
            .get_entry(&id)
            .expect("Failed to read entry")
            .expect("live artifact has an entry");
        self.repo
            .store()
            .append_metadata(&entry.identifier, &MetadataOverlay::uncommitted(id))
            .expect("Failed to append overlay");
        self.repo.index().uncommit(&id).expect("Failed to uncommit");
        *state = ExpectedState::Uncommitted;
    }

    /// Applies one generated operation.
    pub fn apply(&mut self, op: &RepositoryOperation) {
        match op {
            RepositoryOperation::Ingest { uri, body } => {
                self.ingest(&format!("http://example.com/{uri}"), body);
            }
            RepositoryOperation::Commit { nth } => {
                if let Some(&id) = self.ingested.get(*nth) {
                    self.commit(id);
                }
            }
            RepositoryOperation::Delete { nth } => {
                if let Some(&id) = self.ingested.get(*nth) {
                    self.delete(id);
                }
            }
            RepositoryOperation::Withdraw { nth } => {
                if let Some(&id) = self.ingested.get(*nth) {
                    self.withdraw(id);
                }
            }
        }
    }

    /// Checks every artifact against the model.
    pub fn verify(&self) {
        verify_against(&self.repo, &self.expected);
    }

    /// Rebuilds the index and checks again.
    pub fn verify_after_rebuild(&self) {
        let report = self.repo.rebuild().expect("Failed to rebuild");
        assert_eq!(report.skipped(), 0);
        self.verify();
    }

    /// Reopens a directory repository and checks again.
    pub fn verify_after_reopen(&mut self) {
        self.repo.reopen();
        self.verify();
    }

    /// Returns the number of artifacts the model expects to be visible.
    pub fn expected_committed(&self) -> usize {
        self.expected
            .values()
            .filter(|s| **s == ExpectedState::Committed)
            .count()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn verify_against(repo: &Repository, expected: &HashMap<ArtifactId, ExpectedState>) {
    for (id, state) in expected {
        let actual = repo.is_committed(id).expect("Failed to read state");
        let wanted = match state {
            ExpectedState::Uncommitted => Some(false),
            ExpectedState::Committed => Some(true),
            ExpectedState::Deleted => None,
        };
        assert_eq!(actual, wanted, "state of {id}");
    }

    let visible = repo
        .query(&ArtifactPredicate::new().collection("web").committed(true))
        .expect("Failed to query")
        .count();
    let wanted = expected
        .values()
        .filter(|s| **s == ExpectedState::Committed)
        .count();
    assert_eq!(visible, wanted, "visible artifacts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::repository_workload_strategy;
    use proptest::prelude::*;

    #[test]
    fn lifecycle_roundtrip() {
        let mut harness = IntegrationHarness::new();
        let a = harness.ingest("http://a/", b"1");
        let b = harness.ingest("http://a/", b"2");
        harness.commit(a);
        harness.commit(a);
        harness.delete(b);
        harness.delete(b);
        harness.commit(b);
        harness.verify();
        harness.verify_after_rebuild();
        assert_eq!(harness.expected_committed(), 1);
    }

    #[test]
    fn withdrawn_commit_survives_rebuild_and_reopen() {
        let mut harness = IntegrationHarness::on_disk();
        let a = harness.ingest("http://a/", b"1");
        harness.commit(a);
        harness.withdraw(a);
        harness.verify();
        harness.verify_after_rebuild();
        harness.verify_after_reopen();
        assert_eq!(harness.expected_committed(), 0);
    }

    #[test]
    fn lifecycle_survives_reopen() {
        let mut harness = IntegrationHarness::on_disk();
        let a = harness.ingest("http://a/", b"1");
        harness.ingest("http://b/", b"2");
        harness.commit(a);
        harness.verify_after_reopen();

        // Versions continue after the reopen.
        harness.ingest("http://a/", b"3");
        harness.verify();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn rebuild_matches_live_index(ops in repository_workload_strategy(4, 40)) {
            let mut harness = IntegrationHarness::new();
            for op in &ops {
                harness.apply(op);
            }
            harness.verify();
            harness.verify_after_rebuild();
        }
    }
}
