#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-presigned")]
use crate::PresignedTransfer;
use crate::{ByteTransfer, CredentialIssuer, StorageBackend, StorageError, StorageResult};
use parcel_core::Config;
use std::sync::Arc;

/// Storage collaborators selected from configuration.
///
/// `issuer` is `None` for the presigned backend: credentials then come from
/// the chat backend's upload-URL endpoint (see `parcel-api-client`).
#[derive(Clone)]
pub struct StorageBackends {
    pub transfer: Arc<dyn ByteTransfer>,
    pub issuer: Option<Arc<dyn CredentialIssuer>>,
}

/// Create the storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<StorageBackends> {
    match config.storage_backend() {
        #[cfg(feature = "storage-presigned")]
        StorageBackend::Presigned => {
            let transfer = PresignedTransfer::new()?;
            Ok(StorageBackends {
                transfer: Arc::new(transfer),
                issuer: None,
            })
        }

        #[cfg(not(feature = "storage-presigned"))]
        StorageBackend::Presigned => Err(StorageError::ConfigError(
            "Presigned storage backend not available (storage-presigned feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config
                .local_storage_path()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
                })?;
            let base_url = config
                .local_storage_base_url()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
                })?;

            let storage = Arc::new(LocalStorage::new(base_path, base_url).await?);
            Ok(StorageBackends {
                transfer: storage.clone(),
                issuer: Some(storage),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
