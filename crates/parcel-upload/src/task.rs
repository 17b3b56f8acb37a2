//! One upload attempt for one file: fetch credentials, PUT the bytes, report.

use std::sync::Arc;
use std::time::Duration;

use parcel_core::{CredentialRequest, FileRecord};
use parcel_storage::StorageError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::{AttemptOutcome, UploadRegistry};

/// Why an attempt did not produce a destination URL
#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("credential request failed: {0}")]
    Credentials(#[source] StorageError),

    #[error("transfer failed: {0}")]
    Transfer(#[source] StorageError),

    #[error("upload timed out after {0:?}")]
    TimedOut(Duration),

    #[error("upload cancelled")]
    Cancelled,
}

/// A spawned upload attempt. Owns the attempt's cancellation token and
/// reports back to the registry exactly once, keyed by file id and
/// generation.
pub struct UploadTask {
    registry: UploadRegistry,
    record: Arc<FileRecord>,
    generation: u64,
    cancel: CancellationToken,
}

impl UploadTask {
    pub(crate) fn new(
        registry: UploadRegistry,
        record: Arc<FileRecord>,
        generation: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            record,
            generation,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    #[tracing::instrument(
        name = "upload",
        skip(self),
        fields(file_id = %self.record.id, kind = %self.record.kind, generation = self.generation)
    )]
    async fn run(self) {
        let result = match self.registry.upload_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.attempt()).await {
                Ok(result) => result,
                Err(_) => Err(UploadFailure::TimedOut(limit)),
            },
            None => self.attempt().await,
        };

        let outcome = match result {
            Ok(destination_url) => {
                tracing::info!(destination_url = %destination_url, "Upload succeeded");
                AttemptOutcome::Uploaded { destination_url }
            }
            Err(UploadFailure::Cancelled) => {
                tracing::debug!("Upload attempt cancelled");
                AttemptOutcome::Cancelled
            }
            Err(error) => {
                tracing::warn!(error = %error, "Upload failed");
                AttemptOutcome::Failed
            }
        };

        if !self.registry.settle(&self.record.id, self.generation, outcome) {
            tracing::debug!("Discarding outcome of stale upload attempt");
        }
    }

    async fn attempt(&self) -> Result<String, UploadFailure> {
        let request = CredentialRequest {
            kind: self.record.kind,
            extension: self.record.extension.clone(),
        };

        let credentials = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UploadFailure::Cancelled),
            result = self.registry.issuer().issue(&request) => {
                result.map_err(UploadFailure::Credentials)?
            }
        };

        self.registry
            .transfer()
            .put(
                &credentials.signed_write_url,
                &self.record.mime_type,
                self.record.raw_bytes.clone(),
                &self.cancel,
            )
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    UploadFailure::Cancelled
                } else {
                    UploadFailure::Transfer(e)
                }
            })?;

        if self.cancel.is_cancelled() {
            return Err(UploadFailure::Cancelled);
        }

        Ok(credentials.destination_url)
    }
}
