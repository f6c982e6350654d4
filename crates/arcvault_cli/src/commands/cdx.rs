//! CDX lookup command implementation.

use super::open_repository;
use arcvault_core::{parse_cdx_timestamp, CdxFormat, CdxRecords, Repository};
use std::path::Path;

/// A CDX lookup.
#[derive(Debug, Clone)]
pub struct CdxQuery {
    /// Collection to search.
    pub collection: String,
    /// URL, or URL prefix when `prefix` is set.
    pub url: String,
    /// Whether `url` is a prefix.
    pub prefix: bool,
    /// Target timestamp, possibly truncated.
    pub at: Option<String>,
    /// Output format name.
    pub format: String,
}

/// Runs the cdx command.
pub fn run(path: &Path, query: &CdxQuery) -> Result<(), Box<dyn std::error::Error>> {
    let format: CdxFormat = query.format.parse()?;
    let repo = open_repository(path)?;
    let records = lookup(&repo, query)?;
    print!("{}", records.render(format)?);
    Ok(())
}

/// Resolves a query against an open repository.
pub fn lookup(repo: &Repository, query: &CdxQuery) -> Result<CdxRecords, Box<dyn std::error::Error>> {
    let target = query.at.as_deref().map(parse_cdx_timestamp).transpose()?;
    let records = if query.prefix {
        repo.cdx_for_prefix(&query.collection, &query.url, target)?
    } else {
        repo.cdx_for_url(&query.collection, &query.url, target)?
    };
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcvault_core::ArtifactSpec;
    use arcvault_testkit::fixtures::{html_page, TestRepository};
    use std::io::Cursor;

    fn query(url: &str, prefix: bool, at: Option<&str>) -> CdxQuery {
        CdxQuery {
            collection: "web".to_string(),
            url: url.to_string(),
            prefix,
            at: at.map(str::to_string),
            format: "cdx".to_string(),
        }
    }

    fn capture(repo: &Repository, uri: &str, stamp: &str) {
        let spec = ArtifactSpec::new("web", "au", uri, Cursor::new(html_page(stamp)))
            .capture_time(parse_cdx_timestamp(stamp).unwrap());
        let artifact = repo.ingest(spec).unwrap();
        repo.commit(&artifact.id).unwrap();
    }

    #[test]
    fn nearest_capture_comes_first() {
        let repo = TestRepository::memory();
        capture(&repo, "http://example.com/", "20200101000000");
        capture(&repo, "http://example.com/", "20210101000000");
        capture(&repo, "http://example.com/", "20220101000000");

        let records = lookup(&repo, &query("http://example.com/", false, Some("202105"))).unwrap();
        let stamps: Vec<String> = records.records().iter().map(|r| r.timestamp_string()).collect();
        assert_eq!(stamps, ["20210101000000", "20220101000000", "20200101000000"]);
    }

    #[test]
    fn prefix_lookup_spans_urls() {
        let repo = TestRepository::memory();
        capture(&repo, "http://example.com/a", "20200101000000");
        capture(&repo, "http://example.com/b", "20200101000000");
        capture(&repo, "http://other.com/", "20200101000000");

        let records = lookup(&repo, &query("http://example.com/", true, None)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let repo = TestRepository::memory();
        assert!(lookup(&repo, &query("http://example.com/", false, Some("2020-01"))).is_err());
    }
}
