//! Mapping between artifacts, overlays and codec records.

use crate::artifact::{parse_http_head, Artifact};
use crate::digest::ContentDigest;
use crate::error::{CoreError, CoreResult};
use crate::locator::StorageLocator;
use crate::metadata::MetadataOverlay;
use crate::types::{ArtifactId, ArtifactIdentifier};
use arcvault_codec::{format_record_id, names, RecordHeader, RecordType};
use chrono::{DateTime, Utc};

/// Extension headers carrying artifact identity.
pub mod ext {
    /// Collection of the artifact.
    pub const COLLECTION: &str = "X-ArcVault-Collection";
    /// Archival unit of the artifact.
    pub const AU_ID: &str = "X-ArcVault-Au-Id";
    /// URI of the artifact.
    pub const URI: &str = "X-ArcVault-Uri";
    /// Store-assigned version.
    pub const VERSION: &str = "X-ArcVault-Version";
    /// Artifact id the record belongs to.
    pub const ARTIFACT_ID: &str = "X-ArcVault-Artifact-Id";
}

const HTTP_RESPONSE_TYPE: &str = "application/http; msgtype=response";
const OVERLAY_TYPE: &str = "application/json";

/// A record found in a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    /// An artifact record. Its `committed` flag is always false; visibility
    /// lives in overlays.
    Artifact(Artifact),
    /// A metadata overlay.
    Metadata(MetadataOverlay),
}

/// A record together with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRecord {
    /// The decoded record.
    pub record: StoredRecord,
    /// Where it is stored.
    pub locator: StorageLocator,
}

/// Builds the header of an artifact record.
pub(crate) fn artifact_header(
    id: ArtifactId,
    identifier: &ArtifactIdentifier,
    capture_time: DateTime<Utc>,
    digest: &ContentDigest,
) -> CoreResult<RecordHeader> {
    let mut header = RecordHeader::new(RecordType::Response, &id.to_string(), capture_time);
    header.set(names::TARGET_URI, identifier.uri.as_str())?;
    header.set(names::CONTENT_TYPE, HTTP_RESPONSE_TYPE)?;
    header.set(names::PAYLOAD_DIGEST, digest.to_string())?;
    set_identity(&mut header, id, identifier)?;
    header.set(ext::VERSION, identifier.version.to_string())?;
    Ok(header)
}

/// Builds the header of a metadata record overlaying `identifier`.
pub(crate) fn metadata_header(
    identifier: &ArtifactIdentifier,
    overlay: &MetadataOverlay,
) -> CoreResult<RecordHeader> {
    let mut header = RecordHeader::new(
        RecordType::Metadata,
        &ArtifactId::new().to_string(),
        Utc::now(),
    );
    header.set(names::TARGET_URI, identifier.uri.as_str())?;
    header.set(names::CONTENT_TYPE, OVERLAY_TYPE)?;
    header.set(
        names::REFERS_TO,
        format_record_id(&overlay.artifact_id.to_string()),
    )?;
    set_identity(&mut header, overlay.artifact_id, identifier)?;
    Ok(header)
}

fn set_identity(
    header: &mut RecordHeader,
    id: ArtifactId,
    identifier: &ArtifactIdentifier,
) -> CoreResult<()> {
    header.set(ext::COLLECTION, identifier.collection.as_str())?;
    header.set(ext::AU_ID, identifier.au_id.as_str())?;
    header.set(ext::URI, identifier.uri.as_str())?;
    header.set(ext::ARTIFACT_ID, id.to_string())?;
    Ok(())
}

fn require<'a>(header: &'a RecordHeader, name: &str) -> CoreResult<&'a str> {
    header
        .get(name)
        .ok_or_else(|| CoreError::invalid_record(format!("missing {name} header")))
}

/// Decodes an artifact from its record header and the leading payload
/// bytes, which must include the complete HTTP head.
pub(crate) fn decode_artifact(
    header: &RecordHeader,
    payload_prefix: &[u8],
    payload_len: u64,
    locator: StorageLocator,
) -> CoreResult<Artifact> {
    let id = match header.get(ext::ARTIFACT_ID) {
        Some(value) => value.parse()?,
        None => header.record_id()?.parse()?,
    };
    let version = require(header, ext::VERSION)?
        .parse::<u32>()
        .map_err(|_| CoreError::invalid_record("version is not an integer"))?;
    let identifier = ArtifactIdentifier {
        collection: require(header, ext::COLLECTION)?.to_string(),
        au_id: require(header, ext::AU_ID)?.to_string(),
        uri: require(header, ext::URI)?.to_string(),
        version,
    };
    let content_digest: ContentDigest = require(header, names::PAYLOAD_DIGEST)?.parse()?;

    let head = parse_http_head(payload_prefix)?;
    let content_length = payload_len
        .checked_sub(head.len as u64)
        .ok_or_else(|| CoreError::invalid_record("HTTP head longer than payload"))?;

    Ok(Artifact {
        id,
        identifier,
        status: head.status,
        headers: head.headers,
        content_length,
        content_digest,
        locator,
        capture_time: header.date()?,
        committed: false,
    })
}

/// Decodes an overlay from a metadata record payload.
pub(crate) fn decode_metadata(header: &RecordHeader, payload: &[u8]) -> CoreResult<MetadataOverlay> {
    let overlay = MetadataOverlay::from_json(payload)?;
    if let Some(refers_to) = header.refers_to() {
        if refers_to != overlay.artifact_id.to_string() {
            return Err(CoreError::invalid_record(format!(
                "overlay for {} refers to {refers_to}",
                overlay.artifact_id
            )));
        }
    }
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;
    use crate::locator::LocatorScheme;
    use crate::store::LogName;
    use chrono::TimeZone;

    fn identifier() -> ArtifactIdentifier {
        ArtifactIdentifier {
            collection: "web".to_string(),
            au_id: "au-1".to_string(),
            uri: "http://example.com/".to_string(),
            version: 2,
        }
    }

    fn locator() -> StorageLocator {
        StorageLocator::new(
            LocatorScheme::Volatile,
            LogName::for_au("web", "au-1").unwrap(),
            0,
            10,
        )
    }

    #[test]
    fn artifact_header_roundtrip() {
        let id = ArtifactId::new();
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let digest = ContentDigest::compute(DigestAlgorithm::Sha256, b"body");
        let mut header = artifact_header(id, &identifier(), time, &digest).unwrap();
        header.set(names::CONTENT_LENGTH, "23").unwrap();

        let payload = b"HTTP/1.1 200 OK\r\n\r\nbody";
        let artifact = decode_artifact(&header, payload, 23, locator()).unwrap();
        assert_eq!(artifact.id, id);
        assert_eq!(artifact.identifier, identifier());
        assert_eq!(artifact.content_length, 4);
        assert_eq!(artifact.content_digest, digest);
        assert_eq!(artifact.capture_time, time);
        assert_eq!(artifact.status.code, 200);
        assert!(!artifact.committed);
    }

    #[test]
    fn metadata_header_refers_to_artifact() {
        let overlay = MetadataOverlay::committed(ArtifactId::new());
        let header = metadata_header(&identifier(), &overlay).unwrap();
        assert_eq!(header.record_type().unwrap(), RecordType::Metadata);
        assert_eq!(header.refers_to(), Some(overlay.artifact_id.to_string().as_str()));

        let payload = overlay.to_json().unwrap();
        assert_eq!(decode_metadata(&header, &payload).unwrap(), overlay);
    }

    #[test]
    fn metadata_reference_mismatch_is_rejected() {
        let overlay = MetadataOverlay::committed(ArtifactId::new());
        let header = metadata_header(&identifier(), &overlay).unwrap();
        let other = MetadataOverlay::committed(ArtifactId::new()).to_json().unwrap();
        assert!(decode_metadata(&header, &other).is_err());
    }

    #[test]
    fn missing_identity_is_invalid_record() {
        let header = RecordHeader::new(RecordType::Response, "x", Utc::now());
        let err = decode_artifact(&header, b"HTTP/1.1 200 OK\r\n\r\n", 19, locator()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. } | CoreError::InvalidRecord { .. }));
    }
}
