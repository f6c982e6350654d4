//! Temporal ordering of captures.

use super::key::url_sort_key;
use crate::artifact::Artifact;
use crate::index::IndexEntry;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// What the resolver needs to know about a capture.
pub trait Capture {
    /// Captured URI.
    fn uri(&self) -> &str;
    /// Store-assigned version.
    fn version(&self) -> u32;
    /// Capture time.
    fn capture_time(&self) -> DateTime<Utc>;
}

impl Capture for Artifact {
    fn uri(&self) -> &str {
        &self.identifier.uri
    }

    fn version(&self) -> u32 {
        self.identifier.version
    }

    fn capture_time(&self) -> DateTime<Utc> {
        self.capture_time
    }
}

impl Capture for IndexEntry {
    fn uri(&self) -> &str {
        &self.identifier.uri
    }

    fn version(&self) -> u32 {
        self.identifier.version
    }

    fn capture_time(&self) -> DateTime<Utc> {
        self.capture_time
    }
}

/// Orders captures by closeness to a target time.
///
/// With a target, captures sort by the absolute gap between their capture
/// time and the target. The sort is stable, so captures at the same
/// distance keep their input order. Without a target they sort newest
/// version first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NearestResolver {
    target: Option<DateTime<Utc>>,
}

impl NearestResolver {
    /// Creates a resolver; `None` means version order.
    #[must_use]
    pub const fn new(target: Option<DateTime<Utc>>) -> Self {
        Self { target }
    }

    /// Creates a resolver targeting `target`.
    #[must_use]
    pub const fn at(target: DateTime<Utc>) -> Self {
        Self::new(Some(target))
    }

    /// Returns the target time, if any.
    #[must_use]
    pub const fn target(&self) -> Option<DateTime<Utc>> {
        self.target
    }

    /// Orders the versions of one URL.
    #[must_use]
    pub fn resolve<C: Capture>(&self, mut captures: Vec<C>) -> Vec<C> {
        match self.target {
            Some(target) => captures.sort_by_key(|c| gap_millis(c.capture_time(), target)),
            None => captures.sort_by_key(|c| Reverse(c.version())),
        }
        captures
    }

    /// Orders captures spanning several URLs.
    ///
    /// Captures are grouped by URL, groups follow URL sort-key order, and
    /// each group is ordered as [`resolve`](Self::resolve) would.
    #[must_use]
    pub fn resolve_grouped<C: Capture>(&self, captures: Vec<C>) -> Vec<C> {
        let mut groups: BTreeMap<(String, String), Vec<C>> = BTreeMap::new();
        for capture in captures {
            let key = (url_sort_key(capture.uri()), capture.uri().to_string());
            groups.entry(key).or_default().push(capture);
        }
        groups
            .into_values()
            .flat_map(|group| self.resolve(group))
            .collect()
    }
}

fn gap_millis(time: DateTime<Utc>, target: DateTime<Utc>) -> u64 {
    time.signed_duration_since(target)
        .num_milliseconds()
        .unsigned_abs()
}
