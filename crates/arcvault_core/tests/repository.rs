//! End-to-end behaviour of a repository over both volume kinds.

use arcvault_core::{
    ArtifactId, ArtifactPredicate, ArtifactSpec, CdxFormat, Config, ContentDigest, CoreError,
    DigestAlgorithm, DirectoryVolume, LogName, MetadataOverlay, Repository,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Write};
use tempfile::tempdir;

fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Cursor<Vec<u8>> {
    let mut raw = format!("HTTP/1.1 {status}\r\n").into_bytes();
    for (name, value) in headers {
        raw.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(body);
    Cursor::new(raw)
}

fn page(body: &str) -> Cursor<Vec<u8>> {
    response("200 OK", &[("Content-Type", "text/html")], body.as_bytes())
}

fn ingest_committed(repo: &Repository, au: &str, uri: &str, body: &str) -> ArtifactId {
    let artifact = repo
        .ingest(ArtifactSpec::new("web", au, uri, page(body)))
        .unwrap();
    repo.commit(&artifact.id).unwrap();
    artifact.id
}

#[test]
fn versions_start_at_one_and_increase_per_uri() {
    let repo = Repository::open_in_memory().unwrap();
    let versions: Vec<u32> = (0..4)
        .map(|i| {
            repo.ingest(
                ArtifactSpec::new("web", "au", "http://a/", page(&i.to_string())).version_hint(99),
            )
            .unwrap()
            .identifier
            .version
        })
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);

    let other = repo
        .ingest(ArtifactSpec::new("web", "au", "http://b/", page("b")))
        .unwrap();
    assert_eq!(other.identifier.version, 1);

    let other_au = repo
        .ingest(ArtifactSpec::new("web", "au2", "http://a/", page("a")))
        .unwrap();
    assert_eq!(other_au.identifier.version, 1);
}

#[test]
fn commit_is_idempotent() {
    let repo = Repository::open_in_memory().unwrap();
    let artifact = repo
        .ingest(ArtifactSpec::new("web", "au", "http://a/", page("x")))
        .unwrap();

    let first = repo.commit(&artifact.id).unwrap().unwrap();
    let records_after_first = repo.store().scan().unwrap().count();
    let second = repo.commit(&artifact.id).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.store().scan().unwrap().count(), records_after_first);
}

#[test]
fn deleted_artifacts_never_come_back() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path());
    let (kept, gone) = {
        let repo = Repository::open(config.clone()).unwrap();
        let kept = ingest_committed(&repo, "au", "http://a/", "keep");
        let gone = ingest_committed(&repo, "au", "http://b/", "drop");
        assert!(repo.delete(&gone).unwrap());
        (kept, gone)
    };

    let repo = Repository::open(config).unwrap();
    assert!(repo.get_artifact(&gone).unwrap().is_none());
    assert!(repo.commit(&gone).unwrap().is_none());
    let all: Vec<_> = repo
        .query(&ArtifactPredicate::new().collection("web"))
        .unwrap()
        .map(|e| e.id)
        .collect();
    assert_eq!(all, vec![kept]);
}

#[test]
fn stored_bytes_read_back_exactly() {
    let repo = Repository::open_in_memory().unwrap();
    let body: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let artifact = repo
        .ingest(ArtifactSpec::new(
            "web",
            "au",
            "http://a/bin",
            response("200 OK", &[("Content-Type", "application/octet-stream")], &body),
        ))
        .unwrap();

    let data = repo.get_artifact_data(&artifact.id).unwrap().unwrap();
    assert_eq!(&data.body[..], &body[..]);
    assert_eq!(data.artifact.content_length, body.len() as u64);
    assert_eq!(
        data.artifact.content_digest,
        ContentDigest::compute(DigestAlgorithm::Sha256, &body)
    );
    assert_eq!(data.artifact.headers.get("content-type"), Some("application/octet-stream"));
}

#[test]
fn small_spill_threshold_gives_identical_results() {
    let dir = tempdir().unwrap();
    let repo = Repository::open(Config::directory(dir.path()).spill_threshold(16)).unwrap();
    let body = vec![b'q'; 5_000];
    let artifact = repo
        .ingest(ArtifactSpec::new("web", "au", "http://a/", response("200 OK", &[], &body)))
        .unwrap();
    let data = repo.get_artifact_data(&artifact.id).unwrap().unwrap();
    assert_eq!(&data.body[..], &body[..]);
}

#[test]
fn reopen_rebuilds_the_same_index() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path());
    let before = {
        let repo = Repository::open(config.clone()).unwrap();
        let a = ingest_committed(&repo, "au1", "http://a/", "1");
        ingest_committed(&repo, "au1", "http://a/", "2");
        repo.ingest(ArtifactSpec::new("web", "au2", "http://c/", page("pending")))
            .unwrap();
        ingest_committed(&repo, "au2", "http://d/", "4");
        repo.delete(&a).unwrap();
        repo.sync().unwrap();
        repo.query(&ArtifactPredicate::new().collection("web"))
            .unwrap()
            .collect::<Vec<_>>()
    };

    let repo = Repository::open(config).unwrap();
    let after: Vec<_> = repo
        .query(&ArtifactPredicate::new().collection("web"))
        .unwrap()
        .collect();
    assert_eq!(before, after);

    // Versions continue after reopen.
    let next = repo
        .ingest(ArtifactSpec::new("web", "au1", "http://a/", page("3")))
        .unwrap();
    assert_eq!(next.identifier.version, 3);

    // And a second rebuild agrees with the first.
    repo.rebuild().unwrap();
    let again: Vec<_> = repo
        .query(&ArtifactPredicate::new().collection("web").committed(true))
        .unwrap()
        .map(|e| (e.identifier.uri, e.identifier.version))
        .collect();
    assert_eq!(
        again,
        vec![("http://a/".to_string(), 2), ("http://d/".to_string(), 1)]
    );
}

#[test]
fn last_overlay_decides_state_on_rebuild() {
    let repo = Repository::open_in_memory().unwrap();
    let id = ingest_committed(&repo, "au", "http://a/", "x");
    let identifier = repo.get_entry(&id).unwrap().unwrap().identifier;

    repo.store()
        .append_metadata(&identifier, &MetadataOverlay::uncommitted(id))
        .unwrap();
    let report = repo.rebuild().unwrap();
    assert_eq!(repo.is_committed(&id).unwrap(), Some(false));
    assert_eq!(report.committed, 0);
    assert!(repo.latest_artifact("web", "au", "http://a/", false).unwrap().is_none());

    repo.store()
        .append_metadata(&identifier, &MetadataOverlay::committed(id))
        .unwrap();
    repo.rebuild().unwrap();
    assert_eq!(repo.is_committed(&id).unwrap(), Some(true));
}

#[test]
fn readers_never_see_a_partial_rebuild() {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    let repo = Arc::new(Repository::open_in_memory().unwrap());
    let ids: Vec<ArtifactId> = (0..2000)
        .map(|i| ingest_committed(&repo, "au", &format!("http://a/{i:05}"), "x"))
        .collect();
    let last = *ids.last().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let misses = Arc::new(AtomicUsize::new(0));
    let reader = {
        let (repo, done, misses) = (Arc::clone(&repo), Arc::clone(&done), Arc::clone(&misses));
        thread::spawn(move || {
            let mut reads = 0usize;
            while !done.load(Ordering::Acquire) || reads == 0 {
                if repo.is_committed(&last).unwrap() != Some(true) {
                    misses.fetch_add(1, Ordering::Relaxed);
                }
                if repo.list_collections().unwrap().is_empty() {
                    misses.fetch_add(1, Ordering::Relaxed);
                }
                reads += 1;
            }
        })
    };

    for _ in 0..3 {
        assert_eq!(repo.rebuild().unwrap().committed, 2000);
    }
    done.store(true, Ordering::Release);
    reader.join().unwrap();
    assert_eq!(misses.load(Ordering::Relaxed), 0);
}

#[test]
fn header_breaking_identity_is_rejected_before_any_io() {
    let repo = Repository::open_in_memory().unwrap();
    let mut content = page("x");
    let err = repo
        .ingest(ArtifactSpec::new("web", "au", "http://a/\r\nX-Injected: yes", &mut content))
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument { .. }));
    assert_eq!(content.position(), 0);
    assert!(repo.store().volume().list_logs().unwrap().is_empty());
    assert!(repo.store().scan().unwrap().next().is_none());
}

#[test]
fn directory_is_locked_while_open() {
    let dir = tempdir().unwrap();
    let _repo = Repository::open(Config::directory(dir.path())).unwrap();
    assert!(matches!(
        Repository::open(Config::directory(dir.path())),
        Err(CoreError::RepositoryLocked)
    ));
}

#[test]
fn missing_directory_is_an_error_without_create() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path().join("absent")).create_if_missing(false);
    assert!(Repository::open(config).is_err());
}

#[test]
fn corrupt_record_is_skipped_on_rebuild() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path());
    let (a, b, c, offset) = {
        let repo = Repository::open(config.clone()).unwrap();
        let a = ingest_committed(&repo, "au", "http://a/", "first");
        let b = ingest_committed(&repo, "au", "http://b/", "second");
        let c = ingest_committed(&repo, "au", "http://c/", "third");
        let offset = repo.get_entry(&b).unwrap().unwrap().locator.offset();
        (a, b, c, offset)
    };

    let log_path = dir
        .path()
        .join(LogName::for_au("web", "au").unwrap().as_str());
    let mut bytes = fs::read(&log_path).unwrap();
    bytes[offset as usize] = b'X';
    fs::write(&log_path, &bytes).unwrap();

    let repo = Repository::open(config).unwrap();
    let report = repo.rebuild().unwrap();
    assert_eq!(report.corrupt_records, 1);
    // The damaged artifact's own overlays are orphans now.
    assert_eq!(report.orphan_overlays, 2);
    assert_eq!(repo.is_committed(&a).unwrap(), Some(true));
    assert_eq!(repo.is_committed(&b).unwrap(), None);
    assert_eq!(repo.is_committed(&c).unwrap(), Some(true));
}

#[test]
fn torn_tail_is_dropped_and_appends_continue() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path());
    let first = {
        let repo = Repository::open(config.clone()).unwrap();
        ingest_committed(&repo, "au", "http://a/", "first")
    };

    let log_path = dir
        .path()
        .join(LogName::for_au("web", "au").unwrap().as_str());
    let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(b"WARC/1.0\r\nWARC-Record-ID: <urn:uu").unwrap();
    drop(file);

    let second = {
        let repo = Repository::open(config.clone()).unwrap();
        assert_eq!(repo.is_committed(&first).unwrap(), Some(true));
        ingest_committed(&repo, "au", "http://b/", "second")
    };

    let repo = Repository::open(config).unwrap();
    let report = repo.rebuild().unwrap();
    assert_eq!(report.skipped(), 0);
    assert_eq!(repo.is_committed(&first).unwrap(), Some(true));
    assert_eq!(repo.is_committed(&second).unwrap(), Some(true));
}

#[test]
fn overlong_final_record_is_quarantined_before_truncation() {
    let dir = tempdir().unwrap();
    let config = Config::directory(dir.path());
    let (a, b, log_len) = {
        let repo = Repository::open(config.clone()).unwrap();
        let a = ingest_committed(&repo, "au", "http://a/", "first");
        let b = ingest_committed(&repo, "au", "http://b/", "second");
        let name = LogName::for_au("web", "au").unwrap();
        let log_len = fs::metadata(dir.path().join(name.as_str())).unwrap().len();
        (a, b, log_len)
    };

    // Inflate the Content-Length of the last record, keeping its width.
    let name = LogName::for_au("web", "au").unwrap();
    let log_path = dir.path().join(name.as_str());
    let mut bytes = fs::read(&log_path).unwrap();
    let field = b"Content-Length: ";
    let start = bytes
        .windows(field.len())
        .rposition(|w| w == field)
        .unwrap()
        + field.len();
    let record_start = bytes[..start]
        .windows(8)
        .rposition(|w| w == b"WARC/1.0")
        .unwrap();
    let mut i = start;
    while bytes[i].is_ascii_digit() {
        bytes[i] = b'9';
        i += 1;
    }
    fs::write(&log_path, &bytes).unwrap();

    let repo = Repository::open(config).unwrap();
    assert_eq!(repo.is_committed(&a).unwrap(), Some(true));
    // The cut record was b's commit overlay.
    assert_eq!(repo.is_committed(&b).unwrap(), Some(false));
    assert_eq!(fs::metadata(&log_path).unwrap().len(), record_start as u64);

    let kept = dir
        .path()
        .join("quarantine")
        .join(name.as_str().trim_start_matches("collections/"))
        .with_file_name(format!("artifacts.warc.{record_start}"));
    assert_eq!(fs::read(kept).unwrap(), &bytes[record_start..]);
    assert_eq!(bytes.len() as u64, log_len);
}

#[test]
fn nearest_capture_through_the_repository() {
    let repo = Repository::open_in_memory().unwrap();
    let base = Utc.timestamp_opt(12_345, 0).unwrap();
    for hours in [0, 6, 16] {
        let artifact = repo
            .ingest(
                ArtifactSpec::new("web", "au", "http://example.com/", page("v"))
                    .capture_time(base + Duration::hours(hours)),
            )
            .unwrap();
        repo.commit(&artifact.id).unwrap();
    }

    let versions_for = |target| -> Vec<i64> {
        repo.cdx_for_url("web", "http://example.com/", Some(target))
            .unwrap()
            .records()
            .iter()
            .map(|r| (r.timestamp - base).num_hours())
            .collect()
    };
    assert_eq!(versions_for(base - Duration::hours(1)), vec![0, 6, 16]);
    assert_eq!(versions_for(base + Duration::hours(4)), vec![6, 0, 16]);
    assert_eq!(versions_for(base + Duration::hours(7)), vec![6, 0, 16]);
    assert_eq!(versions_for(base + Duration::hours(12)), vec![16, 6, 0]);
    assert_eq!(versions_for(base + Duration::hours(10)), vec![6, 16, 0]);
    assert_eq!(versions_for(base + Duration::hours(30)), vec![16, 6, 0]);

    let newest_first: Vec<i64> = repo
        .cdx_for_url("web", "http://example.com/", None)
        .unwrap()
        .records()
        .iter()
        .map(|r| (r.timestamp - base).num_hours())
        .collect();
    assert_eq!(newest_first, vec![16, 6, 0]);
}

#[test]
fn cdx_prefix_renders_redirects() {
    let repo = Repository::open_in_memory().unwrap();
    let moved = repo
        .ingest(
            ArtifactSpec::new(
                "web",
                "au",
                "http://example.com/old",
                response("301 Moved Permanently", &[("Location", "http://example.com/new")], b""),
            )
            .capture_time(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        )
        .unwrap();
    repo.commit(&moved.id).unwrap();
    ingest_committed(&repo, "au", "http://example.com/new", "here");
    ingest_committed(&repo, "au", "http://other.org/", "elsewhere");

    let records = repo.cdx_for_prefix("web", "http://example.com/", None).unwrap();
    let keys: Vec<&str> = records.records().iter().map(|r| r.url_sort_key.as_str()).collect();
    assert_eq!(keys, vec!["com,example)/new", "com,example)/old"]);

    let text = records.render(CdxFormat::Columnar).unwrap();
    let old_line = text.lines().nth(1).unwrap();
    let fields: Vec<&str> = old_line.split(' ').collect();
    assert_eq!(fields.len(), 11);
    assert_eq!(fields[1], "20240102030405");
    assert_eq!(fields[3], "unk");
    assert_eq!(fields[4], "301");
    assert_eq!(fields[6], "http://example.com/new");
    assert_eq!(fields[8], "0");
    assert_eq!(fields[9], moved.locator.offset().to_string());
}

#[test]
fn empty_predicate_matches_nothing() {
    let repo = Repository::open_in_memory().unwrap();
    ingest_committed(&repo, "au", "http://a/", "x");
    assert_eq!(repo.query(&ArtifactPredicate::new()).unwrap().count(), 0);
}

#[test]
fn unknown_digest_algorithm_fails_at_open() {
    assert!(matches!(
        Repository::open(Config::volatile().digest_algorithm("MD5")),
        Err(CoreError::UnsupportedDigestAlgorithm { .. })
    ));
}

#[test]
fn concurrent_ingest_into_one_uri_assigns_distinct_versions() {
    use std::sync::Arc;
    use std::thread;

    let repo = Arc::new(Repository::open_in_memory().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        repo.ingest(ArtifactSpec::new("web", "au", "http://a/", page(&format!("{t}-{i}"))))
                            .unwrap()
                            .identifier
                            .version
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut versions: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=80).collect::<Vec<_>>());
}

#[test]
fn volume_can_be_supplied_directly() {
    use arcvault_core::VolatileIndex;
    use std::sync::Arc;

    let dir = tempdir().unwrap();
    let volume = Arc::new(DirectoryVolume::open(dir.path(), true).unwrap());
    let repo = Repository::with_parts(volume, Arc::new(VolatileIndex::new()), Config::directory(dir.path())).unwrap();
    let id = ingest_committed(&repo, "au", "http://a/", "x");
    assert!(repo.get_entry(&id).unwrap().unwrap().locator.to_string().starts_with("file:///collections/web/"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn versions_are_gap_free_per_uri(uris in prop::collection::vec(0usize..4, 1..30)) {
        let repo = Repository::open_in_memory().unwrap();
        let mut expected: HashMap<usize, u32> = HashMap::new();
        for u in uris {
            let uri = format!("http://site/{u}");
            let artifact = repo.ingest(ArtifactSpec::new("web", "au", uri, page("x"))).unwrap();
            let next = expected.entry(u).or_insert(0);
            *next += 1;
            prop_assert_eq!(artifact.identifier.version, *next);
        }
    }
}
