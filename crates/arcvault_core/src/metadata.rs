//! Metadata overlays.
//!
//! An overlay records the visibility state of one artifact. Overlays are
//! appended after the artifact record they describe and never rewritten;
//! when several exist for one artifact the last one in append order wins.

use crate::error::CoreResult;
use crate::types::ArtifactId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The visibility state carried by an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayState {
    /// Ingested but not yet visible.
    Uncommitted,
    /// Visible to readers.
    Committed,
    /// Logically removed.
    Deleted,
}

/// The payload of a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataOverlay {
    /// The artifact this overlay describes.
    pub artifact_id: ArtifactId,
    /// Whether the artifact is committed.
    pub committed: bool,
    /// Whether the artifact is deleted.
    pub deleted: bool,
    /// Additional key/value pairs, preserved as written.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

impl MetadataOverlay {
    /// Creates an overlay for a freshly ingested artifact.
    #[must_use]
    pub fn uncommitted(artifact_id: ArtifactId) -> Self {
        Self::with_flags(artifact_id, false, false)
    }

    /// Creates an overlay marking the artifact committed.
    #[must_use]
    pub fn committed(artifact_id: ArtifactId) -> Self {
        Self::with_flags(artifact_id, true, false)
    }

    /// Creates an overlay marking the artifact deleted.
    #[must_use]
    pub fn deleted(artifact_id: ArtifactId) -> Self {
        Self::with_flags(artifact_id, false, true)
    }

    fn with_flags(artifact_id: ArtifactId, committed: bool, deleted: bool) -> Self {
        Self {
            artifact_id,
            committed,
            deleted,
            extensions: BTreeMap::new(),
        }
    }

    /// Returns the state this overlay establishes.
    ///
    /// Deletion takes precedence over the committed flag.
    #[must_use]
    pub fn state(&self) -> OverlayState {
        match (self.deleted, self.committed) {
            (true, _) => OverlayState::Deleted,
            (false, true) => OverlayState::Committed,
            (false, false) => OverlayState::Uncommitted,
        }
    }

    /// Serializes the overlay as a record payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an overlay from a record payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not an overlay.
    pub fn from_json(data: &[u8]) -> CoreResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let id = ArtifactId::new();
        let json = String::from_utf8(MetadataOverlay::committed(id).to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            format!(r#"{{"artifactId":"{id}","committed":true,"deleted":false}}"#)
        );
    }

    #[test]
    fn extensions_roundtrip() {
        let mut overlay = MetadataOverlay::uncommitted(ArtifactId::new());
        overlay
            .extensions
            .insert("reviewer".to_string(), "alice".to_string());

        let bytes = overlay.to_json().unwrap();
        assert_eq!(MetadataOverlay::from_json(&bytes).unwrap(), overlay);
    }

    #[test]
    fn states() {
        let id = ArtifactId::new();
        assert_eq!(MetadataOverlay::uncommitted(id).state(), OverlayState::Uncommitted);
        assert_eq!(MetadataOverlay::committed(id).state(), OverlayState::Committed);
        assert_eq!(MetadataOverlay::deleted(id).state(), OverlayState::Deleted);

        let mut both = MetadataOverlay::committed(id);
        both.deleted = true;
        assert_eq!(both.state(), OverlayState::Deleted);
    }

    #[test]
    fn rejects_garbage() {
        assert!(MetadataOverlay::from_json(b"{\"committed\":true}").is_err());
        assert!(MetadataOverlay::from_json(b"not json").is_err());
    }
}
