//! Inspect command implementation.

use super::open_repository;
use arcvault_core::{ArtifactPredicate, LogName, LogVolume, Repository, StatsSnapshot};
use arcvault_storage::StorageBackend;
use serde::Serialize;
use std::path::Path;

/// Repository inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Repository path.
    pub path: String,
    /// Number of logs on disk.
    pub log_count: usize,
    /// Total size of all logs in bytes.
    pub total_size: u64,
    /// Artifacts in the listed collections, committed or not.
    pub artifacts: u64,
    /// Records the rebuild skipped as damaged or orphaned.
    pub records_skipped: u64,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of AUs with committed artifacts.
    pub au_count: usize,
    /// Number of committed artifacts.
    pub committed: usize,
    /// Number of uncommitted artifacts.
    pub uncommitted: usize,
    /// AU statistics (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aus: Option<Vec<AuStats>>,
}

/// Statistics for a single archival unit.
#[derive(Debug, Serialize)]
pub struct AuStats {
    /// AU id.
    pub id: String,
    /// Total content length of committed artifacts, latest versions only.
    pub size: u64,
    /// Log file size in bytes.
    pub log_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_aus: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repo = open_repository(path)?;
    let result = inspect(path, &repo, show_aus)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics from an open repository.
pub fn inspect(
    path: &Path,
    repo: &Repository,
    show_aus: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let volume = repo.store().volume();
    let logs = volume.list_logs()?;
    let mut total_size = 0u64;
    for name in &logs {
        total_size += log_size(volume.as_ref(), name)?;
    }

    let mut collections = Vec::new();
    for name in repo.list_collections()? {
        let committed = repo
            .query(&ArtifactPredicate::new().collection(&name).committed(true))?
            .count();
        let uncommitted = repo
            .query(&ArtifactPredicate::new().collection(&name).committed(false))?
            .count();
        let au_ids = repo.list_aus(&name)?;

        let aus = if show_aus {
            let mut aus = Vec::with_capacity(au_ids.len());
            for id in &au_ids {
                aus.push(AuStats {
                    id: id.clone(),
                    size: repo.au_size(&name, id)?,
                    log_size: log_size(volume.as_ref(), &LogName::for_au(&name, id)?)?,
                });
            }
            Some(aus)
        } else {
            None
        };

        collections.push(CollectionStats {
            name,
            au_count: au_ids.len(),
            committed,
            uncommitted,
            aus,
        });
    }

    let stats: StatsSnapshot = repo.stats();
    Ok(InspectResult {
        path: path.display().to_string(),
        log_count: logs.len(),
        total_size,
        artifacts: collections
            .iter()
            .map(|c| (c.committed + c.uncommitted) as u64)
            .sum(),
        records_skipped: stats.records_skipped,
        collections,
    })
}

fn log_size(volume: &dyn LogVolume, name: &LogName) -> Result<u64, Box<dyn std::error::Error>> {
    Ok(match volume.open_log(name, false)? {
        Some(backend) => backend.size()?,
        None => 0,
    })
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} bytes")
    }
}

fn print_text_output(result: &InspectResult) {
    println!("ArcVault Repository: {}", result.path);
    println!("{:-<60}", "");
    println!("Logs:             {}", result.log_count);
    println!("Total size:       {}", format_size(result.total_size));
    println!("Artifacts:        {}", result.artifacts);
    if result.records_skipped > 0 {
        println!("Skipped records:  {}", result.records_skipped);
    }

    for collection in &result.collections {
        println!();
        println!(
            "Collection {}: {} AUs, {} committed, {} uncommitted",
            collection.name, collection.au_count, collection.committed, collection.uncommitted
        );
        if let Some(aus) = &collection.aus {
            for au in aus {
                println!(
                    "  {:<40} {:>12} content {:>12} log",
                    au.id,
                    format_size(au.size),
                    format_size(au.log_size)
                );
            }
        }
    }
}
