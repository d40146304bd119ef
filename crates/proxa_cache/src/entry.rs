use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One cached unit of work: the request that produced it and the payload
/// fetched from the origin.
///
/// Entries are immutable once stored. The request/response bodies are opaque
/// byte sequences and travel through the store as base64, so non-UTF-8
/// content survives the string-valued store untouched.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub method: String,
    pub path: String,
    #[serde(with = "base64_bytes")]
    pub request_body: Vec<u8>,
    /// Header names are lowercased on construction; lookups against this map
    /// are case-insensitive by construction.
    pub request_headers: BTreeMap<String, String>,
    pub origin: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// The stored blob was not a well-formed entry (bad JSON, missing field,
/// invalid base64). Callers treat this as a cache miss, not a failure.
#[derive(Debug, Error)]
#[error("malformed cache entry: {0}")]
pub struct EntryCodecError(#[from] serde_json::Error);

impl CacheEntry {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        request_body: Vec<u8>,
        request_headers: impl IntoIterator<Item = (String, String)>,
        origin: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        let request_headers = request_headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            method: method.into(),
            path: path.into(),
            request_body,
            request_headers,
            origin: origin.into(),
            payload,
        }
    }

    /// Serializes the entry to the store's string representation.
    pub fn encode(&self) -> Result<String, EntryCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a stored blob back into an entry.
    pub fn decode(blob: &str) -> Result<Self, EntryCodecError> {
        Ok(serde_json::from_str(blob)?)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::CacheEntry;

    fn sample() -> CacheEntry {
        CacheEntry::new(
            "GET",
            "/users/1",
            Vec::new(),
            [("Accept".to_string(), "application/json".to_string())],
            "http://localhost:9000",
            b"{\"id\": 1}".to_vec(),
        )
    }

    #[test]
    fn round_trip_preserves_the_entry() {
        let entry = sample();
        let blob = entry.encode().expect("encode");
        let decoded = CacheEntry::decode(&blob).expect("decode");
        assert_eq!(entry, decoded);
    }

    #[test]
    fn round_trip_preserves_binary_bodies() {
        let entry = CacheEntry::new(
            "POST",
            "/upload",
            vec![0x00, 0xff, 0x9f, 0x92, 0x96],
            Vec::<(String, String)>::new(),
            "http://localhost:9000",
            vec![0xde, 0xad, 0xbe, 0xef],
        );
        let blob = entry.encode().expect("encode");
        // The blob itself must be plain text even though the bodies are not.
        assert!(blob.is_ascii());
        let decoded = CacheEntry::decode(&blob).expect("decode");
        assert_eq!(entry, decoded);
    }

    #[test]
    fn header_names_are_lowercased() {
        let entry = sample();
        assert!(entry.request_headers.contains_key("accept"));
        assert!(!entry.request_headers.contains_key("Accept"));
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(CacheEntry::decode("not json at all").is_err());
    }

    #[test]
    fn decode_rejects_missing_fields() {
        assert!(CacheEntry::decode(r#"{"method":"GET","path":"/x"}"#).is_err());
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let blob = r#"{"method":"GET","path":"/x","request_body":"!!!","request_headers":{},"origin":"http://o","payload":""}"#;
        assert!(CacheEntry::decode(blob).is_err());
    }
}
