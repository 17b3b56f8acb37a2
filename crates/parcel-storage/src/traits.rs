//! Storage abstraction traits
//!
//! An upload is two calls against two collaborators: a [`CredentialIssuer`]
//! hands out a destination URL plus a short-lived signed write URL, then a
//! [`ByteTransfer`] writes the file body to the signed URL.

use async_trait::async_trait;
use bytes::Bytes;
use parcel_core::{AppError, CredentialRequest, StorageBackend, UploadCredentials};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Credential request failed: {0}")]
    CredentialsFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => AppError::Config(msg),
            StorageError::IoError(e) => AppError::from(e),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Issues upload credentials for one file.
///
/// Any failure (non-success response, transport error, undecodable body) is
/// opaque to callers; the upload engine maps all of them to a remote rejection.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, request: &CredentialRequest) -> StorageResult<UploadCredentials>;
}

/// Writes a file body to a signed write URL.
///
/// Implementations must stop as soon as `cancel` fires and report
/// [`StorageError::Cancelled`] in that case. A success must never be reported
/// after the token was observed cancelled.
#[async_trait]
pub trait ByteTransfer: Send + Sync {
    async fn put(
        &self,
        signed_write_url: &str,
        content_type: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
