//! Log volumes: where the append-only logs of a repository live.
//!
//! Every (collection, AU) pair owns one log. A directory volume lays them
//! out as:
//!
//! ```text
//! <root>/
//! ├─ LOCK                                   # Advisory lock for single-writer
//! ├─ collections/
//! │  └─ <collection>/
//! │     └─ au-<sha256(au id), 16 hex>/
//! │        └─ artifacts.warc                # Artifact and metadata records
//! └─ quarantine/
//!    └─ <collection>/au-<…>/artifacts.warc.<offset>   # Cut-off log tails
//! ```
//!
//! The AU id is hashed because it is an arbitrary string; the record
//! headers carry it verbatim.

use crate::error::{CoreError, CoreResult};
use crate::locator::LocatorScheme;
use crate::types::validate_collection;
use arcvault_storage::{FileBackend, InMemoryBackend, StorageBackend};
use fs2::FileExt;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";
const COLLECTIONS_DIR: &str = "collections";
const QUARANTINE_DIR: &str = "quarantine";
const LOG_FILE: &str = "artifacts.warc";
const AU_PREFIX: &str = "au-";
const AU_HASH_LEN: usize = 16;

/// Volume-relative path of one log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogName(String);

impl LogName {
    /// Returns the log that holds records for `(collection, au_id)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the collection is not a valid name.
    pub fn for_au(collection: &str, au_id: &str) -> CoreResult<Self> {
        validate_collection(collection)?;
        let hash = Sha256::digest(au_id.as_bytes());
        let hex: String = hash[..AU_HASH_LEN / 2]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Ok(Self(format!(
            "{COLLECTIONS_DIR}/{collection}/{AU_PREFIX}{hex}/{LOG_FILE}"
        )))
    }

    /// Parses a log name, checking its layout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` is not a log path.
    pub fn parse(name: &str) -> CoreResult<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        let valid = match parts.as_slice() {
            [COLLECTIONS_DIR, collection, au, LOG_FILE] => {
                validate_collection(collection).is_ok()
                    && au.strip_prefix(AU_PREFIX).is_some_and(|h| {
                        h.len() == AU_HASH_LEN && h.chars().all(|c| c.is_ascii_hexdigit())
                    })
            }
            _ => false,
        };
        if !valid {
            return Err(CoreError::invalid_argument(format!(
                "not a log name: {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the collection the log belongs to.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    /// Returns the log's file name, used as the CDX archive name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        LOG_FILE
    }
}

impl fmt::Display for LogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A namespace of append-only logs.
///
/// Implementations differ only in where bytes live; record layout,
/// ordering and locking above the byte level belong to the store.
pub trait LogVolume: Send + Sync {
    /// Returns the locator scheme for logs in this volume.
    fn scheme(&self) -> LocatorScheme;

    /// Opens a log, creating it when `create` is set.
    ///
    /// Returns `None` if the log does not exist and `create` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened.
    fn open_log(&self, name: &LogName, create: bool)
        -> CoreResult<Option<Arc<dyn StorageBackend>>>;

    /// Lists every existing log, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume cannot be enumerated.
    fn list_logs(&self) -> CoreResult<Vec<LogName>>;

    /// Keeps a copy of the bytes cut from the end of a log at `offset`,
    /// returning where they went.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be made durable.
    fn quarantine(&self, name: &LogName, offset: u64, bytes: &[u8]) -> CoreResult<String>;

    /// Returns a human-readable description for diagnostics.
    fn describe(&self) -> String;
}

/// A volume whose logs live in memory.
#[derive(Default)]
pub struct InMemoryVolume {
    logs: RwLock<BTreeMap<LogName, Arc<InMemoryBackend>>>,
    quarantined: RwLock<BTreeMap<(LogName, u64), Vec<u8>>>,
}

impl InMemoryVolume {
    /// Creates an empty volume.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bytes quarantined from `name` at `offset`.
    #[must_use]
    pub fn quarantined(&self, name: &LogName, offset: u64) -> Option<Vec<u8>> {
        self.quarantined.read().get(&(name.clone(), offset)).cloned()
    }
}

impl LogVolume for InMemoryVolume {
    fn scheme(&self) -> LocatorScheme {
        LocatorScheme::Volatile
    }

    fn open_log(
        &self,
        name: &LogName,
        create: bool,
    ) -> CoreResult<Option<Arc<dyn StorageBackend>>> {
        if let Some(log) = self.logs.read().get(name) {
            return Ok(Some(log.clone() as Arc<dyn StorageBackend>));
        }
        if !create {
            return Ok(None);
        }
        let log = self
            .logs
            .write()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(InMemoryBackend::new()))
            .clone();
        Ok(Some(log as Arc<dyn StorageBackend>))
    }

    fn list_logs(&self) -> CoreResult<Vec<LogName>> {
        Ok(self.logs.read().keys().cloned().collect())
    }

    fn quarantine(&self, name: &LogName, offset: u64, bytes: &[u8]) -> CoreResult<String> {
        self.quarantined
            .write()
            .insert((name.clone(), offset), bytes.to_vec());
        Ok(format!("memory:{name}@{offset}"))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// A volume rooted at a directory.
///
/// # Thread Safety
///
/// The volume holds an exclusive lock on `<root>/LOCK` for its lifetime.
/// Only one `DirectoryVolume` can exist per directory at a time, across
/// processes.
pub struct DirectoryVolume {
    root: PathBuf,
    logs: RwLock<HashMap<LogName, Arc<FileBackend>>>,
    _lock_file: File,
}

impl DirectoryVolume {
    /// Opens or creates a volume directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `RepositoryLocked`)
    /// - I/O errors occur
    pub fn open(root: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !root.exists() {
            if create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(CoreError::invalid_argument(format!(
                    "repository directory does not exist: {}",
                    root.display()
                )));
            }
        }
        if !root.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::RepositoryLocked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            logs: RwLock::new(HashMap::new()),
            _lock_file: lock_file,
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the filesystem path of a log.
    #[must_use]
    pub fn log_path(&self, name: &LogName) -> PathBuf {
        name.as_str()
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Returns where the tail cut from `name` at `offset` is kept.
    #[must_use]
    pub fn quarantine_path(&self, name: &LogName, offset: u64) -> PathBuf {
        let relative = name
            .as_str()
            .strip_prefix(COLLECTIONS_DIR)
            .unwrap_or(name.as_str())
            .trim_start_matches('/');
        let path = relative
            .split('/')
            .fold(self.root.join(QUARANTINE_DIR), |path, part| path.join(part));
        path.with_file_name(format!("{LOG_FILE}.{offset}"))
    }

    #[cfg(unix)]
    fn sync_directory(path: &Path) -> CoreResult<()> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(_path: &Path) -> CoreResult<()> {
        Ok(())
    }
}

impl LogVolume for DirectoryVolume {
    fn scheme(&self) -> LocatorScheme {
        LocatorScheme::File
    }

    fn open_log(
        &self,
        name: &LogName,
        create: bool,
    ) -> CoreResult<Option<Arc<dyn StorageBackend>>> {
        if let Some(log) = self.logs.read().get(name) {
            return Ok(Some(log.clone() as Arc<dyn StorageBackend>));
        }

        let path = self.log_path(name);
        let mut logs = self.logs.write();
        if let Some(log) = logs.get(name) {
            return Ok(Some(log.clone() as Arc<dyn StorageBackend>));
        }
        let existed = path.exists();
        if !existed && !create {
            return Ok(None);
        }

        let log = Arc::new(FileBackend::open_with_create_dirs(&path)?);
        if !existed {
            if let Some(parent) = path.parent() {
                Self::sync_directory(parent)?;
            }
        }
        logs.insert(name.clone(), log.clone());
        Ok(Some(log as Arc<dyn StorageBackend>))
    }

    fn list_logs(&self) -> CoreResult<Vec<LogName>> {
        let collections = self.root.join(COLLECTIONS_DIR);
        if !collections.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for collection in fs::read_dir(&collections)? {
            let collection = collection?;
            if !collection.file_type()?.is_dir() {
                continue;
            }
            for au in fs::read_dir(collection.path())? {
                let au = au?;
                if !au.path().join(LOG_FILE).is_file() {
                    continue;
                }
                let candidate = format!(
                    "{COLLECTIONS_DIR}/{}/{}/{LOG_FILE}",
                    collection.file_name().to_string_lossy(),
                    au.file_name().to_string_lossy()
                );
                // Foreign files under the tree are not logs.
                if let Ok(name) = LogName::parse(&candidate) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn quarantine(&self, name: &LogName, offset: u64, bytes: &[u8]) -> CoreResult<String> {
        let path = self.quarantine_path(name, offset);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        if let Some(parent) = path.parent() {
            Self::sync_directory(parent)?;
        }
        Ok(path.display().to_string())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
