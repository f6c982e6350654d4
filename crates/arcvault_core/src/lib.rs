//! # ArcVault Core
//!
//! Versioned, append-only storage of HTTP captures.
//!
//! This crate provides:
//! - Identity and version assignment for captures
//! - The artifact store over pluggable log volumes
//! - An in-memory artifact index with conjunctive predicates
//! - The commit/delete protocol and index rebuild ([`Repository`])
//! - Nearest-capture resolution and CDX rendering
//! - A streaming payload digest filter for ingestion
//!
//! ## Quick start
//!
//! ```rust
//! use arcvault_core::{ArtifactSpec, Repository};
//!
//! let repo = Repository::open_in_memory().unwrap();
//! let response = &b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello"[..];
//!
//! let artifact = repo
//!     .ingest(ArtifactSpec::new("web", "au1", "http://example.com/", response))
//!     .unwrap();
//! assert_eq!(artifact.identifier.version, 1);
//!
//! repo.commit(&artifact.id).unwrap();
//! let data = repo.get_artifact_data(&artifact.id).unwrap().unwrap();
//! assert_eq!(&data.body[..], b"hello");
//! ```
//!
//! ## Payload digests
//!
//! ```rust
//! use arcvault_core::{DigestAlgorithm, DigestFilter};
//! use std::io::Write;
//!
//! let mut filter = DigestFilter::new(Vec::new(), DigestAlgorithm::Sha256);
//! filter.write_all(b"HTTP/1.1 200 OK\r\n\r\nBODY").unwrap();
//! let (head, digest) = filter.finish();
//! assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n");
//! assert_eq!(digest.algorithm, DigestAlgorithm::Sha256);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod cdx;
mod config;
mod digest;
mod error;
mod index;
mod locator;
mod metadata;
mod repository;
mod stats;
mod store;
mod types;

pub use artifact::{
    find_head_end, parse_http_head, Artifact, ArtifactData, ArtifactSpec, HttpHead, HttpHeaders,
    HttpStatus,
};
pub use cdx::{
    parse_cdx_timestamp, url_sort_key, Capture, CdxFormat, CdxRecord, CdxRecords,
    NearestResolver, CDX_TIMESTAMP_FORMAT,
};
pub use config::{Config, StorageKind};
pub use digest::{ContentDigest, DigestAlgorithm, DigestFilter};
pub use error::{CoreError, CoreResult};
pub use index::{
    ArtifactFilter, ArtifactIndex, ArtifactPredicate, EntryIter, IndexCursor, IndexEntry,
    VolatileIndex,
};
pub use locator::{LocatorScheme, StorageLocator};
pub use metadata::{MetadataOverlay, OverlayState};
pub use repository::{RebuildReport, Repository};
pub use stats::{RepositoryStats, StatsSnapshot};
pub use store::{
    ext, ArtifactStore, DirectoryVolume, InMemoryVolume, LogName, LogVolume, ScannedRecord,
    StoreScan, StoredRecord,
};
pub use types::{validate_au_id, validate_collection, ArtifactId, ArtifactIdentifier, ArtifactStem};
