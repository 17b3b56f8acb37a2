use crate::keys::generate_storage_key;
use crate::traits::{ByteTransfer, CredentialIssuer, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use parcel_core::{CredentialRequest, UploadCredentials};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Scheme of the write URLs handed out by [`LocalStorage`].
const LOCAL_WRITE_SCHEME: &str = "local://";

/// Local filesystem storage implementation
///
/// Acts as both collaborators: it issues `local://{key}` write URLs and
/// accepts writes to them, publishing files under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/parcel/attachments")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(storage_key))
    }

    /// Extract the storage key from a write URL issued by this backend
    fn key_from_write_url<'a>(&self, signed_write_url: &'a str) -> StorageResult<&'a str> {
        signed_write_url
            .strip_prefix(LOCAL_WRITE_SCHEME)
            .ok_or_else(|| {
                StorageError::InvalidKey(format!(
                    "Not a local write URL: {}",
                    signed_write_url
                ))
            })
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl CredentialIssuer for LocalStorage {
    async fn issue(&self, request: &CredentialRequest) -> StorageResult<UploadCredentials> {
        let key = generate_storage_key(request.kind, &request.extension);
        Ok(UploadCredentials {
            destination_url: self.generate_url(&key),
            signed_write_url: format!("{}{}", LOCAL_WRITE_SCHEME, key),
        })
    }
}

/// Delete a finished write whose token fired meanwhile, so a cancelled
/// upload never leaves a file behind.
async fn discard_if_cancelled(path: &Path, cancel: &CancellationToken) -> StorageResult<()> {
    if !cancel.is_cancelled() {
        return Ok(());
    }

    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove cancelled upload");
    }
    Err(StorageError::Cancelled)
}

#[async_trait]
impl ByteTransfer for LocalStorage {
    async fn put(
        &self,
        signed_write_url: &str,
        _content_type: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let key = self.key_from_write_url(signed_write_url)?;
        let path = self.key_to_path(key)?;
        let size = body.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A half-written file must not stay behind under a public URL.
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::Cancelled);
            }
            result = self.write_file(&path, &body) => result?,
        }

        discard_if_cancelled(&path, cancel).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::FileKind;
    use tempfile::tempdir;

    fn request(kind: FileKind, extension: &str) -> CredentialRequest {
        CredentialRequest {
            kind,
            extension: extension.to_string(),
        }
    }

    #[tokio::test]
    async fn test_local_storage_issue_and_put() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files/".to_string())
            .await
            .unwrap();

        let creds = storage.issue(&request(FileKind::Image, "png")).await.unwrap();
        assert!(creds.signed_write_url.starts_with("local://attachments/image/"));
        assert!(creds
            .destination_url
            .starts_with("http://localhost:8080/files/attachments/image/"));

        storage
            .put(
                &creds.signed_write_url,
                "image/png",
                Bytes::from_static(b"test data"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let key = creds.signed_write_url.trim_start_matches("local://");
        let written = fs::read(dir.path().join(key)).await.unwrap();
        assert_eq!(written, b"test data");
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files".to_string())
            .await
            .unwrap();

        let token = CancellationToken::new();
        let result = storage
            .put("local://../../etc/passwd", "text/plain", Bytes::new(), &token)
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put("local:///etc/passwd", "text/plain", Bytes::new(), &token)
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_foreign_write_url_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files".to_string())
            .await
            .unwrap();

        let result = storage
            .put(
                "https://bucket.s3.amazonaws.com/x",
                "text/plain",
                Bytes::new(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_cancelled_put_writes_nothing() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files".to_string())
            .await
            .unwrap();

        let creds = storage.issue(&request(FileKind::Document, "pdf")).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = storage
            .put(
                &creds.signed_write_url,
                "application/pdf",
                Bytes::from_static(b"%PDF"),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(StorageError::Cancelled)));

        let key = creds.signed_write_url.trim_start_matches("local://");
        assert!(!dir.path().join(key).exists());
    }

    #[tokio::test]
    async fn test_write_finished_after_cancel_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late.bin");
        fs::write(&path, b"bytes").await.unwrap();

        let cancel = CancellationToken::new();
        assert!(discard_if_cancelled(&path, &cancel).await.is_ok());
        assert!(path.exists());

        cancel.cancel();
        let result = discard_if_cancelled(&path, &cancel).await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
        assert!(!path.exists());
    }
}
