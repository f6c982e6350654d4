//! Verify command implementation.
//!
//! Walks every log record by record without opening the repository, so a
//! damaged log is reported as found and never repaired.

use super::locked_logs;
use arcvault_codec::{names, parse_record_id, CodecError, RecordHeader, RecordReader, RecordType};
use arcvault_core::{ext, find_head_end, ContentDigest, CoreError};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Number of valid records.
    pub valid_records: usize,
    /// Number of records that could not be decoded.
    pub corrupt_records: usize,
    /// Number of logs ending in a partial record.
    pub torn_tails: usize,
    /// Number of overlays naming an artifact not earlier in their log.
    pub orphan_overlays: usize,
    /// Number of artifact records whose payload digest does not match.
    pub digest_mismatches: usize,
    /// Error messages.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn merge(&mut self, other: VerifyResult) {
        self.records_checked += other.records_checked;
        self.valid_records += other.valid_records;
        self.corrupt_records += other.corrupt_records;
        self.torn_tails += other.torn_tails;
        self.orphan_overlays += other.orphan_overlays;
        self.digest_mismatches += other.digest_mismatches;
        self.errors.extend(other.errors);
    }

    /// Returns true if nothing wrong was found.
    ///
    /// A torn tail is not an error: the store drops it on the next open.
    pub fn is_clean(&self) -> bool {
        self.corrupt_records == 0 && self.orphan_overlays == 0 && self.digest_mismatches == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path, check_digests: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = verify_repository(path, check_digests)?;

    println!("Records checked:   {}", result.records_checked);
    println!("Valid records:     {}", result.valid_records);
    println!("Corrupt records:   {}", result.corrupt_records);
    println!("Orphan overlays:   {}", result.orphan_overlays);
    if check_digests {
        println!("Digest mismatches: {}", result.digest_mismatches);
    }
    if result.torn_tails > 0 {
        println!("Torn tails:        {}", result.torn_tails);
    }

    for error in &result.errors {
        println!("  - {error}");
    }

    if result.is_clean() {
        println!("\nRepository integrity verified.");
        Ok(())
    } else {
        Err("Repository verification failed".into())
    }
}

/// Verifies every log of the repository at `path`.
pub fn verify_repository(
    path: &Path,
    check_digests: bool,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let (_volume, logs) = locked_logs(path)?;
    let mut result = VerifyResult::default();
    for (name, file) in logs {
        let log = verify_log(&name.to_string(), File::open(&file)?, check_digests)?;
        result.merge(log);
    }
    Ok(result)
}

fn verify_log(
    name: &str,
    file: File,
    check_digests: bool,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let mut reader = RecordReader::new(file)?;
    let mut artifacts = HashSet::new();

    loop {
        let at = match reader.read_record() {
            Ok(Some(at)) => at,
            Ok(None) => break,
            Err(CodecError::Truncated { offset }) => {
                result.records_checked += 1;
                // Only a partial record at the very end is a torn tail.
                match reader.resync()? {
                    None => {
                        result.torn_tails += 1;
                        result
                            .errors
                            .push(format!("{name}: partial record at offset {offset}"));
                        break;
                    }
                    Some(_) => {
                        result.corrupt_records += 1;
                        result
                            .errors
                            .push(format!("{name}: truncated record at offset {offset}"));
                        continue;
                    }
                }
            }
            Err(e) if e.is_corruption() => {
                result.records_checked += 1;
                result.corrupt_records += 1;
                result.errors.push(format!("{name}: {e}"));
                if reader.resync()?.is_none() {
                    break;
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        result.records_checked += 1;

        let header = at.record.header();
        let finding = match at.record.record_type() {
            Ok(RecordType::Response) => {
                check_artifact(header, at.record.payload(), check_digests).map(|id| {
                    artifacts.insert(id);
                })
            }
            Ok(RecordType::Metadata) => match header.refers_to().map(parse_record_id) {
                Some(target) if artifacts.contains(target) => Ok(()),
                Some(target) => Err(Finding::Orphan(format!(
                    "overlay for unknown artifact {target}"
                ))),
                None => Err(Finding::Corrupt(format!(
                    "overlay without {}",
                    names::REFERS_TO
                ))),
            },
            Err(e) => Err(Finding::Corrupt(e.to_string())),
        };

        match finding {
            Ok(()) => result.valid_records += 1,
            Err(finding) => {
                let message = match finding {
                    Finding::Corrupt(m) => {
                        result.corrupt_records += 1;
                        m
                    }
                    Finding::Orphan(m) => {
                        result.orphan_overlays += 1;
                        m
                    }
                    Finding::DigestMismatch(m) => {
                        result.digest_mismatches += 1;
                        m
                    }
                };
                result
                    .errors
                    .push(format!("{name}: record at offset {}: {message}", at.offset));
            }
        }
    }

    Ok(result)
}

enum Finding {
    Corrupt(String),
    Orphan(String),
    DigestMismatch(String),
}

/// Checks the identity headers of an artifact record and returns its id.
fn check_artifact(
    header: &RecordHeader,
    payload: &[u8],
    check_digests: bool,
) -> Result<String, Finding> {
    for name in [ext::COLLECTION, ext::AU_ID, ext::URI, ext::VERSION] {
        if header.get(name).is_none() {
            return Err(Finding::Corrupt(format!("missing {name}")));
        }
    }
    let version = header.get(ext::VERSION).unwrap_or_default();
    if !matches!(version.parse::<u32>(), Ok(v) if v > 0) {
        return Err(Finding::Corrupt(format!("invalid version {version:?}")));
    }
    let id = header
        .record_id()
        .map_err(|e| Finding::Corrupt(e.to_string()))?
        .to_string();

    if check_digests {
        let stored: ContentDigest = header
            .get(names::PAYLOAD_DIGEST)
            .ok_or_else(|| Finding::Corrupt(format!("missing {}", names::PAYLOAD_DIGEST)))?
            .parse()
            .map_err(|e: CoreError| Finding::Corrupt(e.to_string()))?;
        let body_start = find_head_end(payload)
            .ok_or_else(|| Finding::Corrupt("payload has no HTTP header block".to_string()))?;
        let computed = ContentDigest::compute(stored.algorithm, &payload[body_start..]);
        if computed != stored {
            return Err(Finding::DigestMismatch(format!(
                "payload digest mismatch: stored={stored}, computed={computed}"
            )));
        }
    }
    Ok(id)
}
