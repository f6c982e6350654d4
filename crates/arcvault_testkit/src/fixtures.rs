//! Test fixtures and repository helpers.
//!
//! Provides temporary repositories and canned HTTP responses.

use arcvault_core::{ArtifactId, ArtifactSpec, Config, Repository};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test repository with automatic cleanup.
pub struct TestRepository {
    /// The repository instance. `None` only while reopening.
    repo: Option<Repository>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestRepository {
    /// Creates a new in-memory test repository.
    pub fn memory() -> Self {
        Self {
            repo: Some(Repository::open_in_memory().expect("Failed to open in-memory repository")),
            temp_dir: None,
        }
    }

    /// Creates a new directory-backed test repository.
    pub fn directory() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let repo = Repository::open(Config::directory(temp_dir.path()))
            .expect("Failed to open directory repository");
        Self {
            repo: Some(repo),
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the repository root if directory-backed.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes and reopens a directory-backed repository, rebuilding its
    /// index from disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory repositories, which do not survive closing.
    pub fn reopen(&mut self) {
        let root: PathBuf = self
            .path()
            .expect("Only directory repositories can be reopened")
            .to_path_buf();
        // Release the directory lock before opening again.
        self.repo = None;
        self.repo = Some(Repository::open(Config::directory(root)).expect("Failed to reopen repository"));
    }
}

impl std::ops::Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        self.repo.as_ref().expect("repository is open")
    }
}

/// Runs a test with a temporary in-memory repository.
///
/// # Example
///
/// ```rust,ignore
/// use arcvault_testkit::with_temp_repo;
///
/// #[test]
/// fn my_test() {
///     with_temp_repo(|repo| {
///         let id = arcvault_testkit::ingest_page(repo, "web", "au", "http://a/", "hi");
///         repo.commit(&id).unwrap();
///     });
/// }
/// ```
pub fn with_temp_repo<F, R>(f: F) -> R
where
    F: FnOnce(&Repository) -> R,
{
    let test_repo = TestRepository::memory();
    f(&*test_repo)
}

/// Runs a test with a temporary directory repository.
pub fn with_dir_repo<F, R>(f: F) -> R
where
    F: FnOnce(&Repository, &Path) -> R,
{
    let test_repo = TestRepository::directory();
    let path = test_repo.path().expect("Directory repository should have a path");
    f(&*test_repo, path)
}

/// Builds a raw HTTP response.
pub fn http_response(status: u16, reason: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut raw = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
    for (name, value) in headers {
        raw.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(body);
    raw
}

/// Builds a `200 OK` HTML response.
pub fn html_page(body: &str) -> Vec<u8> {
    let length = body.len().to_string();
    http_response(
        200,
        "OK",
        &[
            ("Content-Type", "text/html; charset=utf-8"),
            ("Content-Length", length.as_str()),
        ],
        body.as_bytes(),
    )
}

/// Builds a `302 Found` redirect.
pub fn redirect(location: &str) -> Vec<u8> {
    http_response(302, "Found", &[("Location", location)], b"")
}

/// Ingests an HTML page and returns its id. The artifact is uncommitted.
pub fn ingest_page(repo: &Repository, collection: &str, au: &str, uri: &str, body: &str) -> ArtifactId {
    repo.ingest(ArtifactSpec::new(collection, au, uri, Cursor::new(html_page(body))))
        .expect("Failed to ingest page")
        .id
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a repository with `uris` committed pages in one AU, each
    /// with `versions` versions.
    pub fn populated_repository(uris: usize, versions: usize) -> TestRepository {
        let repo = TestRepository::memory();
        for u in 0..uris {
            for v in 0..versions {
                let id = ingest_page(&repo, "web", "au", &format!("http://example.com/{u}"), &format!("{u}.{v}"));
                repo.commit(&id).expect("Failed to commit");
            }
        }
        repo
    }

    /// Creates a repository with one committed page in each of several
    /// collections.
    pub fn multi_collection_repository(collections: usize) -> TestRepository {
        let repo = TestRepository::memory();
        for c in 0..collections {
            let id = ingest_page(&repo, &format!("collection_{c}"), "au", "http://example.com/", "page");
            repo.commit(&id).expect("Failed to commit");
        }
        repo
    }
}
