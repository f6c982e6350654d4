//! CLI command implementations.

pub mod cdx;
pub mod dump;
pub mod ingest;
pub mod inspect;
pub mod verify;

use arcvault_core::{Config, DirectoryVolume, LogName, LogVolume, Repository};
use std::path::{Path, PathBuf};

/// Opens an existing repository, rebuilding its index.
pub fn open_repository(path: &Path) -> Result<Repository, Box<dyn std::error::Error>> {
    Ok(Repository::open(
        Config::directory(path).create_if_missing(false),
    )?)
}

/// Locks the repository at `path` and lists its logs with their files.
///
/// The returned volume holds the directory lock; keep it alive while the
/// files are read.
pub fn locked_logs(
    path: &Path,
) -> Result<(DirectoryVolume, Vec<(LogName, PathBuf)>), Box<dyn std::error::Error>> {
    let volume = DirectoryVolume::open(path, false)?;
    let logs = volume
        .list_logs()?
        .into_iter()
        .map(|name| {
            let file = volume.log_path(&name);
            (name, file)
        })
        .collect();
    Ok((volume, logs))
}
