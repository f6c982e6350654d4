//! Identity types: artifact ids, stems and versioned identifiers.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an artifact.
///
/// Artifact IDs are UUIDv4 values that are:
/// - Assigned once, at ingestion
/// - Immutable once assigned
/// - Never reused
///
/// The textual form is the lowercase hyphenated UUID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    /// Creates a new random artifact ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an artifact ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactId({})", self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ArtifactId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::invalid_argument(format!("not an artifact id: {s:?}")))
    }
}

impl From<Uuid> for ArtifactId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

/// Addresses every version of one URI within an archival unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactStem {
    /// Top-level collection.
    pub collection: String,
    /// Archival unit within the collection.
    pub au_id: String,
    /// Captured URI.
    pub uri: String,
}

impl ArtifactStem {
    /// Creates a validated stem.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any part is empty or the collection is
    /// not usable as a directory name.
    pub fn new(
        collection: impl Into<String>,
        au_id: impl Into<String>,
        uri: impl Into<String>,
    ) -> CoreResult<Self> {
        let stem = Self {
            collection: collection.into(),
            au_id: au_id.into(),
            uri: uri.into(),
        };
        stem.validate()?;
        Ok(stem)
    }

    /// Checks the stem's parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` describing the first bad part.
    pub fn validate(&self) -> CoreResult<()> {
        validate_collection(&self.collection)?;
        validate_au_id(&self.au_id)?;
        if self.uri.is_empty() {
            return Err(CoreError::invalid_argument("uri must not be empty"));
        }
        validate_header_text("uri", &self.uri)
    }

    /// Attaches a version to this stem.
    #[must_use]
    pub fn with_version(self, version: u32) -> ArtifactIdentifier {
        ArtifactIdentifier {
            collection: self.collection,
            au_id: self.au_id,
            uri: self.uri,
            version,
        }
    }
}

impl fmt::Display for ArtifactStem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.au_id, self.uri)
    }
}

/// The full address of one artifact version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactIdentifier {
    /// Top-level collection.
    pub collection: String,
    /// Archival unit within the collection.
    pub au_id: String,
    /// Captured URI.
    pub uri: String,
    /// Store-assigned version, starting at 1.
    pub version: u32,
}

impl ArtifactIdentifier {
    /// Returns the identifier without its version.
    #[must_use]
    pub fn stem(&self) -> ArtifactStem {
        ArtifactStem {
            collection: self.collection.clone(),
            au_id: self.au_id.clone(),
            uri: self.uri.clone(),
        }
    }
}

impl fmt::Display for ArtifactIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.collection, self.au_id, self.uri, self.version
        )
    }
}

/// Checks that a collection name is non-empty and usable as a single path
/// component.
///
/// # Errors
///
/// Returns `InvalidArgument` if the name is rejected.
pub fn validate_collection(collection: &str) -> CoreResult<()> {
    if collection.is_empty() {
        return Err(CoreError::invalid_argument("collection must not be empty"));
    }
    if collection == "." || collection == ".." || collection.contains(['/', '\\', '\0']) {
        return Err(CoreError::invalid_argument(format!(
            "collection {collection:?} is not a valid name"
        )));
    }
    validate_header_text("collection", collection)
}

/// Checks that an archival unit id is non-empty and fits in a record
/// header.
///
/// # Errors
///
/// Returns `InvalidArgument` if the id is rejected.
pub fn validate_au_id(au_id: &str) -> CoreResult<()> {
    if au_id.is_empty() {
        return Err(CoreError::invalid_argument("au id must not be empty"));
    }
    validate_header_text("au id", au_id)
}

/// Identity fields are written as header values, which cannot hold line
/// breaks and lose surrounding whitespace when parsed back.
fn validate_header_text(field: &str, value: &str) -> CoreResult<()> {
    if value.contains(['\r', '\n']) {
        return Err(CoreError::invalid_argument(format!(
            "{field} {value:?} contains a line break"
        )));
    }
    if value.trim() != value {
        return Err(CoreError::invalid_argument(format!(
            "{field} {value:?} has surrounding whitespace"
        )));
    }
    Ok(())
}
