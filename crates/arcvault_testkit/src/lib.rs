//! # ArcVault Testkit
//!
//! Test utilities for ArcVault.
//!
//! This crate provides:
//! - Temporary repositories and canned HTTP responses
//! - Property-based test generators using proptest
//! - A model-checking harness for the commit protocol
//! - Crash and damage simulation for directory repositories
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arcvault_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_repository() {
//!     with_temp_repo(|repo| {
//!         let id = ingest_page(repo, "web", "au", "http://example.com/", "hello");
//!         repo.commit(&id).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
