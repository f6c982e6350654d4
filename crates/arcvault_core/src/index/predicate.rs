//! Query predicates over index entries.

use super::IndexEntry;

/// One condition on an index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactFilter {
    /// Collection equals.
    Collection(String),
    /// Archival unit equals.
    AuId(String),
    /// URI equals.
    Uri(String),
    /// URI starts with.
    UriPrefix(String),
    /// Version equals.
    Version(u32),
    /// Committed flag equals.
    Committed(bool),
}

impl ArtifactFilter {
    /// Returns true if `entry` satisfies this filter.
    #[must_use]
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        let id = &entry.identifier;
        match self {
            Self::Collection(c) => id.collection == *c,
            Self::AuId(a) => id.au_id == *a,
            Self::Uri(u) => id.uri == *u,
            Self::UriPrefix(p) => id.uri.starts_with(p.as_str()),
            Self::Version(v) => id.version == *v,
            Self::Committed(c) => entry.committed == *c,
        }
    }
}

/// A conjunction of filters.
///
/// An empty predicate matches nothing: a query has to say what it wants.
/// Every added filter can only narrow the result.
///
/// # Example
///
/// ```rust
/// use arcvault_core::ArtifactPredicate;
///
/// let visible_pages = ArtifactPredicate::new()
///     .collection("web")
///     .uri_prefix("http://example.com/")
///     .committed(true);
/// assert_eq!(visible_pages.filters().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPredicate {
    filters: Vec<ArtifactFilter>,
}

impl ArtifactPredicate {
    /// Creates an empty predicate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    #[must_use]
    pub fn with(mut self, filter: ArtifactFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Requires the collection to equal `collection`.
    #[must_use]
    pub fn collection(self, collection: impl Into<String>) -> Self {
        self.with(ArtifactFilter::Collection(collection.into()))
    }

    /// Requires the archival unit to equal `au_id`.
    #[must_use]
    pub fn au_id(self, au_id: impl Into<String>) -> Self {
        self.with(ArtifactFilter::AuId(au_id.into()))
    }

    /// Requires the URI to equal `uri`.
    #[must_use]
    pub fn uri(self, uri: impl Into<String>) -> Self {
        self.with(ArtifactFilter::Uri(uri.into()))
    }

    /// Requires the URI to start with `prefix`.
    #[must_use]
    pub fn uri_prefix(self, prefix: impl Into<String>) -> Self {
        self.with(ArtifactFilter::UriPrefix(prefix.into()))
    }

    /// Requires the version to equal `version`.
    #[must_use]
    pub fn version(self, version: u32) -> Self {
        self.with(ArtifactFilter::Version(version))
    }

    /// Requires the committed flag to equal `committed`.
    #[must_use]
    pub fn committed(self, committed: bool) -> Self {
        self.with(ArtifactFilter::Committed(committed))
    }

    /// Returns the filters in insertion order.
    #[must_use]
    pub fn filters(&self) -> &[ArtifactFilter] {
        &self.filters
    }

    /// Returns true if no filters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns true if `entry` satisfies every filter.
    #[must_use]
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        !self.is_empty() && self.filters.iter().all(|f| f.matches(entry))
    }

    /// Returns the collection every match must have, if fixed.
    pub(crate) fn fixed_collection(&self) -> Option<&str> {
        self.filters.iter().find_map(|f| match f {
            ArtifactFilter::Collection(c) => Some(c.as_str()),
            _ => None,
        })
    }

    /// Returns the AU every match must have, if fixed.
    pub(crate) fn fixed_au(&self) -> Option<&str> {
        self.filters.iter().find_map(|f| match f {
            ArtifactFilter::AuId(a) => Some(a.as_str()),
            _ => None,
        })
    }

    /// Returns a prefix every matching URI starts with, if one is known.
    ///
    /// An exact URI is its own prefix.
    pub(crate) fn uri_lower_bound(&self) -> Option<&str> {
        self.filters.iter().find_map(|f| match f {
            ArtifactFilter::Uri(u) | ArtifactFilter::UriPrefix(u) => Some(u.as_str()),
            _ => None,
        })
    }
}
