//! Property-based test generators using proptest.
//!
//! Provides strategies for generating identities, HTTP responses and
//! operation sequences that keep the repository's input rules.

use crate::fixtures::http_response;
use arcvault_core::ArtifactId;
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating artifact ids.
pub fn artifact_id_strategy() -> impl Strategy<Value = ArtifactId> {
    prop::array::uniform16(any::<u8>()).prop_map(|bytes| ArtifactId::from_uuid(Uuid::from_bytes(bytes)))
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating archival unit ids.
pub fn au_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9&=|%.]{1,40}").expect("Invalid regex")
}

/// Strategy for generating URIs under a few hosts.
pub fn uri_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["http", "https"]),
        prop::sample::select(vec!["example.com", "www.example.org", "news.example.net:8080"]),
        prop::string::string_regex("(/[a-z0-9]{1,8}){0,3}/?").expect("Invalid regex"),
    )
        .prop_map(|(scheme, host, path)| format!("{scheme}://{host}{path}"))
}

/// Strategy for generating response bodies.
pub fn body_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Strategy for generating complete raw HTTP responses.
pub fn http_response_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::sample::select(vec![(200u16, "OK"), (301, "Moved Permanently"), (404, "Not Found")]),
        prop::sample::select(vec!["text/html", "image/png", "application/json"]),
        body_strategy(),
    )
        .prop_map(|((status, reason), mime, body)| {
            http_response(status, reason, &[("Content-Type", mime)], &body)
        })
}

/// One step of a repository workload.
#[derive(Debug, Clone)]
pub enum RepositoryOperation {
    /// Ingest a new version of one of a few URIs.
    Ingest {
        /// Which URI.
        uri: usize,
        /// Body of the page.
        body: Vec<u8>,
    },
    /// Commit the n-th ingested artifact, if it exists.
    Commit {
        /// Index into the ingested artifacts.
        nth: usize,
    },
    /// Delete the n-th ingested artifact, if it exists.
    Delete {
        /// Index into the ingested artifacts.
        nth: usize,
    },
    /// Append an uncommitted overlay for the n-th ingested artifact
    /// directly to the store, if it is still live.
    Withdraw {
        /// Index into the ingested artifacts.
        nth: usize,
    },
}

/// Strategy for generating repository operations over `uris` URIs.
pub fn repository_operation_strategy(uris: usize) -> impl Strategy<Value = RepositoryOperation> {
    prop_oneof![
        3 => (0..uris, prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(uri, body)| RepositoryOperation::Ingest { uri, body }),
        2 => (0usize..32).prop_map(|nth| RepositoryOperation::Commit { nth }),
        1 => (0usize..32).prop_map(|nth| RepositoryOperation::Delete { nth }),
        1 => (0usize..32).prop_map(|nth| RepositoryOperation::Withdraw { nth }),
    ]
}

/// Strategy for generating a workload.
pub fn repository_workload_strategy(
    uris: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<RepositoryOperation>> {
    prop::collection::vec(repository_operation_strategy(uris), 1..max_len)
}

/// Strategy for splitting `data` into consecutive chunks.
pub fn chunking_strategy(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=len, 0..8).prop_map(move |mut cuts| {
        cuts.sort_unstable();
        cuts.dedup();
        cuts
    })
}

/// Splits `data` at sorted `cuts`.
pub fn split_at_cuts<'a>(data: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut parts = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.min(data.len());
        if cut > start {
            parts.push(&data[start..cut]);
            start = cut;
        }
    }
    parts.push(&data[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcvault_core::{parse_http_head, validate_collection, ArtifactStem};

    proptest! {
        #[test]
        fn generated_collections_are_valid(name in collection_name_strategy()) {
            prop_assert!(validate_collection(&name).is_ok());
        }

        #[test]
        fn generated_identities_are_valid(
            collection in collection_name_strategy(),
            au in au_id_strategy(),
            uri in uri_strategy(),
        ) {
            prop_assert!(ArtifactStem::new(collection, au, uri).is_ok());
        }

        #[test]
        fn generated_responses_parse(raw in http_response_strategy()) {
            prop_assert!(parse_http_head(&raw).is_ok());
        }

        #[test]
        fn splitting_preserves_bytes(data in body_strategy(), cuts in chunking_strategy(2048)) {
            let joined: Vec<u8> = split_at_cuts(&data, &cuts).concat();
            prop_assert_eq!(joined, data);
        }
    }
}
