//! Ingest command implementation.

use arcvault_core::{parse_cdx_timestamp, Artifact, ArtifactSpec, Config, Repository};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// One capture to add.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Target collection.
    pub collection: String,
    /// Target archival unit.
    pub au: String,
    /// Captured URI.
    pub uri: String,
    /// File holding the raw HTTP response.
    pub file: PathBuf,
    /// Capture time as a CDX timestamp.
    pub capture_time: Option<String>,
    /// Whether to commit after ingesting.
    pub commit: bool,
}

/// Runs the ingest command, creating the repository if needed.
pub fn run(path: &Path, request: &IngestRequest) -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::open(Config::directory(path))?;
    let artifact = ingest(&repo, request)?;
    repo.sync()?;

    println!("Artifact:  {}", artifact.id);
    println!("Version:   {}", artifact.identifier.version);
    println!("Digest:    {}", artifact.content_digest);
    println!("Length:    {}", artifact.content_length);
    println!("Committed: {}", if request.commit { "yes" } else { "no" });
    Ok(())
}

/// Ingests the request's file into an open repository.
pub fn ingest(
    repo: &Repository,
    request: &IngestRequest,
) -> Result<Artifact, Box<dyn std::error::Error>> {
    let content = BufReader::new(File::open(&request.file)?);
    let mut spec = ArtifactSpec::new(
        request.collection.as_str(),
        request.au.as_str(),
        request.uri.as_str(),
        content,
    );
    if let Some(stamp) = &request.capture_time {
        spec = spec.capture_time(parse_cdx_timestamp(stamp)?);
    }

    let artifact = repo.ingest(spec)?;
    if request.commit {
        repo.commit(&artifact.id)?;
    }
    info!(
        id = %artifact.id,
        uri = %artifact.identifier.uri,
        version = artifact.identifier.version,
        "ingested {}",
        request.file.display()
    );
    Ok(artifact)
}
