//! Repository configuration.

use arcvault_codec::DEFAULT_SPILL_THRESHOLD;
use std::path::PathBuf;

/// Where a repository keeps its logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Logs live in memory and vanish with the repository.
    Volatile,
    /// Logs live under a directory on the local filesystem.
    Directory(PathBuf),
}

/// Configuration for opening a repository.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing storage for the logs.
    pub storage: StorageKind,

    /// Whether to create the repository directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Payloads larger than this are staged in a temporary file during
    /// ingestion instead of memory.
    pub spill_threshold: usize,

    /// Name of the payload digest algorithm, e.g. `SHA-256`.
    pub digest_algorithm: String,

    /// Whether to sync the log after every append (safer but slower).
    pub sync_on_append: bool,

    /// Largest HTTP response head accepted at ingestion.
    pub max_http_head_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageKind::Volatile,
            create_if_missing: true,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            digest_algorithm: "SHA-256".to_string(),
            sync_on_append: false,
            max_http_head_size: 64 * 1024, // 64 KB
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for an in-memory repository.
    #[must_use]
    pub fn volatile() -> Self {
        Self::default()
    }

    /// Creates a configuration for a repository rooted at `path`.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageKind::Directory(path.into()),
            ..Self::default()
        }
    }

    /// Sets the backing storage.
    #[must_use]
    pub fn storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Sets whether to create the repository if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the in-memory staging limit for ingested payloads.
    #[must_use]
    pub const fn spill_threshold(mut self, bytes: usize) -> Self {
        self.spill_threshold = bytes;
        self
    }

    /// Sets the payload digest algorithm by name.
    ///
    /// The name is validated when the repository is opened.
    #[must_use]
    pub fn digest_algorithm(mut self, name: impl Into<String>) -> Self {
        self.digest_algorithm = name.into();
        self
    }

    /// Sets whether to sync the log after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets the largest accepted HTTP response head.
    #[must_use]
    pub const fn max_http_head_size(mut self, bytes: usize) -> Self {
        self.max_http_head_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.storage, StorageKind::Volatile);
        assert!(config.create_if_missing);
        assert!(!config.sync_on_append);
        assert_eq!(config.digest_algorithm, "SHA-256");
        assert_eq!(config.spill_threshold, 16 * 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::directory("/tmp/arcvault")
            .create_if_missing(false)
            .sync_on_append(true)
            .digest_algorithm("sha512")
            .spill_threshold(1024);

        assert_eq!(
            config.storage,
            StorageKind::Directory(PathBuf::from("/tmp/arcvault"))
        );
        assert!(!config.create_if_missing);
        assert!(config.sync_on_append);
        assert_eq!(config.digest_algorithm, "sha512");
        assert_eq!(config.spill_threshold, 1024);
    }
}
