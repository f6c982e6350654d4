//! The artifact index.
//!
//! The index answers lookups by id and structured queries over identity
//! fields without touching the logs. It is a cache: everything in it can
//! be rebuilt by replaying the store.
//!
//! # Visibility
//!
//! Listings report committed entries only. Queries report whatever their
//! predicate asks for, so callers that want only visible artifacts add
//! `committed(true)`.

mod predicate;
mod traits;
mod volatile;

pub use predicate::{ArtifactFilter, ArtifactPredicate};
pub use traits::{ArtifactIndex, EntryIter, IndexEntry};
pub use volatile::{IndexCursor, VolatileIndex};
