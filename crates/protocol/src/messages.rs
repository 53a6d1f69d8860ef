use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Metadata attached to an uploaded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub content_type: String,
}

/// One element of the bulk asset upload body.
///
/// `value` holds the base64-encoded file content and `base64` is always
/// `true` for uploads produced by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUploadEntry {
    pub key: String,
    pub value: String,
    pub metadata: AssetMetadata,
    pub base64: bool,
}

impl AssetUploadEntry {
    /// Builds an entry from raw bytes, encoding them as base64.
    pub fn from_bytes(key: impl Into<String>, data: &[u8], content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: STANDARD.encode(data),
            metadata: AssetMetadata {
                content_type: content_type.into(),
            },
            base64: true,
        }
    }

    /// Size of the encoded payload value in bytes.
    pub fn encoded_len(&self) -> usize {
        self.value.len()
    }
}

/// Marks fingerprints as present in the remote dedup registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertHashesRequest {
    pub hashes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of the upload-token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTokenResult {
    pub jwt: String,
}
