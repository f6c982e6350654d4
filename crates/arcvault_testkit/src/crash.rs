//! Crash and damage simulation for directory repositories.
//!
//! A crash while appending leaves a partial record at the end of a log;
//! bit rot or a stray write damages a record in the middle. These helpers
//! produce both kinds of damage in a closed repository's logs so tests
//! can check that reopening recovers everything that was not touched.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arcvault_testkit::crash::{log_path, truncate_log};
//!
//! let path = log_path(root, "web", "au");
//! truncate_log(&path, last_record_offset + 10);
//! let repo = Repository::open(Config::directory(root))?;
//! ```

use arcvault_core::LogName;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ways to damage a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damage {
    /// Cut the log at this length, as a crash mid-append would.
    TruncateTo(u64),
    /// Flip the byte at this offset.
    FlipByte(u64),
    /// Append bytes that do not form a complete record.
    TornAppend,
}

/// Returns the file holding the log of `(collection, au_id)`.
pub fn log_path(root: &Path, collection: &str, au_id: &str) -> PathBuf {
    let name = LogName::for_au(collection, au_id).expect("Invalid collection");
    root.join(name.as_str())
}

/// Cuts the log file at `len` bytes.
pub fn truncate_log(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open log");
    file.set_len(len).expect("Failed to truncate log");
}

/// Inverts every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: u64) {
    let mut bytes = fs::read(path).expect("Failed to read log");
    let index = usize::try_from(offset).expect("Offset too large");
    bytes[index] = !bytes[index];
    fs::write(path, bytes).expect("Failed to write log");
}

/// Appends the start of a record that never finishes.
pub fn append_torn_record(path: &Path) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open log");
    file.write_all(b"WARC/1.0\r\nWARC-Type: response\r\nContent-Len")
        .expect("Failed to append");
}

/// Applies `damage` to the log at `path`.
pub fn apply(path: &Path, damage: Damage) {
    match damage {
        Damage::TruncateTo(len) => truncate_log(path, len),
        Damage::FlipByte(offset) => flip_byte(path, offset),
        Damage::TornAppend => append_torn_record(path),
    }
}
