//! Dump command implementation.

use super::locked_logs;
use arcvault_codec::{names, parse_record_id, RecordHead, RecordReader, RecordType};
use arcvault_core::{ext, MetadataOverlay, OverlayState};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Overlays are small JSON documents; this is enough to decode them.
const PREVIEW_BYTES: usize = 4096;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Log holding the record.
    pub log: String,
    /// Offset in the log.
    pub offset: u64,
    /// Total record length.
    pub length: u64,
    /// Record type.
    pub record_type: String,
    /// Artifact id: the record's own for artifacts, the target for overlays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    /// Target URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Version (artifact records only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// State set by the overlay (metadata records only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Payload size in bytes.
    pub payload_size: u64,
    /// Decoding error, if the record is damaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    collection: Option<&str>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(path, collection, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records, optionally from one collection's logs.
pub fn read_records(
    path: &Path,
    collection: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let (_volume, logs) = locked_logs(path)?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for (name, file) in logs {
        if collection.is_some_and(|c| c != name.collection()) {
            continue;
        }
        let mut reader = RecordReader::new(File::open(&file)?)?;
        while records.len() < limit {
            match reader.read_head(PREVIEW_BYTES) {
                Ok(Some(head)) => records.push(describe(name.as_str(), &head)),
                Ok(None) => break,
                Err(e) => {
                    records.push(RecordInfo {
                        log: name.to_string(),
                        offset: reader.position(),
                        length: 0,
                        record_type: "damaged".to_string(),
                        artifact_id: None,
                        uri: None,
                        version: None,
                        state: None,
                        payload_size: 0,
                        error: Some(e.to_string()),
                    });
                    if !e.is_corruption() || reader.resync()?.is_none() {
                        break;
                    }
                }
            }
        }
    }

    Ok(records)
}

fn describe(log: &str, head: &RecordHead) -> RecordInfo {
    let header = &head.header;
    let mut info = RecordInfo {
        log: log.to_string(),
        offset: head.offset,
        length: head.length,
        record_type: header.get(names::TYPE).unwrap_or("?").to_string(),
        artifact_id: None,
        uri: header.target_uri().map(str::to_string),
        version: None,
        state: None,
        payload_size: head.payload_len(),
        error: None,
    };

    match header.record_type() {
        Ok(RecordType::Response) => {
            info.artifact_id = header.record_id().ok().map(str::to_string);
            info.version = header.get(ext::VERSION).map(str::to_string);
        }
        Ok(RecordType::Metadata) => {
            info.artifact_id = header.refers_to().map(|v| parse_record_id(v).to_string());
            if head.preview_is_complete() {
                match MetadataOverlay::from_json(&head.preview) {
                    Ok(overlay) => info.state = Some(state_name(overlay.state()).to_string()),
                    Err(e) => info.error = Some(e.to_string()),
                }
            }
        }
        Err(e) => info.error = Some(e.to_string()),
    }
    info
}

fn state_name(state: OverlayState) -> &'static str {
    match state {
        OverlayState::Uncommitted => "uncommitted",
        OverlayState::Committed => "committed",
        OverlayState::Deleted => "deleted",
    }
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Records ({} total)", records.len());
    println!("{:-<100}", "");

    let mut current_log = None;
    for record in records {
        if current_log != Some(record.log.as_str()) {
            println!("{}", record.log);
            current_log = Some(record.log.as_str());
        }

        print!("  @{:<10} {:<10}", record.offset, record.record_type);
        if let Some(id) = &record.artifact_id {
            print!(" id={id}");
        }
        if let Some(version) = &record.version {
            print!(" v={version}");
        }
        if let Some(state) = &record.state {
            print!(" state={state}");
        }
        if let Some(uri) = &record.uri {
            print!(" uri={uri}");
        }
        print!(" size={}", record.payload_size);
        if let Some(error) = &record.error {
            print!(" error={error}");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcvault_core::{Config, Repository};
    use arcvault_testkit::fixtures::ingest_page;

    #[test]
    fn dumps_artifacts_and_overlays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::open(Config::directory(dir.path())).unwrap();
        let id = ingest_page(&repo, "web", "au", "http://a/", "hello");
        repo.commit(&id).unwrap();
        ingest_page(&repo, "other", "au", "http://b/", "x");
        drop(repo);

        let records = read_records(dir.path(), Some("web"), None).unwrap();
        let kinds: Vec<_> = records.iter().map(|r| r.record_type.as_str()).collect();
        assert_eq!(kinds, ["response", "metadata", "metadata"]);

        assert_eq!(records[0].artifact_id.as_deref(), Some(id.to_string().as_str()));
        assert_eq!(records[0].version.as_deref(), Some("1"));
        assert_eq!(records[1].state.as_deref(), Some("uncommitted"));
        assert_eq!(records[2].state.as_deref(), Some("committed"));
        assert_eq!(records[2].artifact_id, records[0].artifact_id);
    }

    #[test]
    fn limit_applies_across_logs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::open(Config::directory(dir.path())).unwrap();
        ingest_page(&repo, "a", "au", "http://a/", "1");
        ingest_page(&repo, "b", "au", "http://b/", "2");
        drop(repo);

        assert_eq!(read_records(dir.path(), None, Some(3)).unwrap().len(), 3);
        assert_eq!(read_records(dir.path(), None, None).unwrap().len(), 4);
    }
}
