use serde::{Deserialize, Serialize};

use super::file::FileKind;

/// Request for a signed upload URL, parameterized by kind and extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRequest {
    #[serde(rename = "file_type")]
    pub kind: FileKind,
    #[serde(rename = "file_extension")]
    pub extension: String,
}

/// Upload credentials returned by the backend for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCredentials {
    /// Public URL the file will be reachable at once written
    #[serde(rename = "image_url", alias = "destination_url")]
    pub destination_url: String,
    /// Short-lived URL accepting a single HTTP PUT of the file body
    #[serde(rename = "presigned_url", alias = "signed_write_url")]
    pub signed_write_url: String,
}
