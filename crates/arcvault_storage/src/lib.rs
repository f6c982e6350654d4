//! # ArcVault Storage
//!
//! Append-only log backends for the ArcVault artifact repository.
//!
//! This crate provides the lowest-level storage abstraction for ArcVault.
//! Storage backends are **opaque byte logs** - they do not interpret
//! the records they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple byte logs (read, append, flush)
//! - No knowledge of the record format, artifacts, or metadata overlays
//! - Must be `Send + Sync`; appends and reads take `&self`
//! - Offsets handed out by `append` never move and never get reused
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and volatile repositories
//! - [`FileBackend`] - For persistent logs using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use arcvault_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{Extent, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn check_log(
        backend: &dyn StorageBackend,
        chunks: &[Vec<u8>],
        streamed: &[bool],
    ) -> Result<(), TestCaseError> {
        let mut extents = Vec::new();
        for (chunk, &stream) in chunks.iter().zip(streamed.iter().cycle()) {
            let extent = if stream {
                backend
                    .append_with(&mut |sink| {
                        sink.write_all(chunk)?;
                        Ok(chunk.len() as u64)
                    })
                    .unwrap()
            } else {
                Extent {
                    offset: backend.append(chunk).unwrap(),
                    length: chunk.len() as u64,
                }
            };
            extents.push(extent);
        }

        let mut expected_offset = 0;
        for (extent, chunk) in extents.iter().zip(chunks) {
            // Offsets are gap-free and every append reads back unchanged.
            prop_assert_eq!(extent.offset, expected_offset);
            prop_assert_eq!(&backend.read_at(extent.offset, chunk.len()).unwrap(), chunk);
            expected_offset = extent.end();
        }
        prop_assert_eq!(backend.size().unwrap(), expected_offset);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn appends_read_back_at_their_offsets(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 1..16),
            streamed in prop::collection::vec(any::<bool>(), 1..4),
        ) {
            check_log(&InMemoryBackend::new(), &chunks, &streamed)?;

            let dir = tempfile::tempdir().unwrap();
            let file = FileBackend::open(&dir.path().join("log")).unwrap();
            check_log(&file, &chunks, &streamed)?;
        }
    }
}
