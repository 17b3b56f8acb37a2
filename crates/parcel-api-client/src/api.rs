//! Domain methods: upload credentials and message send.

use crate::ApiClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parcel_core::{CredentialRequest, OutgoingMessage, UploadCredentials};
use parcel_storage::{CredentialIssuer, StorageError, StorageResult};
use parcel_upload::SendTransport;
use serde::Deserialize;

/// Response of the upload-URL endpoint. Some deployments wrap the payload in
/// a `data` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadUrlResponse {
    Wrapped { data: UploadCredentials },
    Bare(UploadCredentials),
}

impl UploadUrlResponse {
    fn into_credentials(self) -> UploadCredentials {
        match self {
            UploadUrlResponse::Wrapped { data } => data,
            UploadUrlResponse::Bare(credentials) => credentials,
        }
    }
}

impl ApiClient {
    /// Request a destination URL and a signed write URL for one file.
    pub async fn request_upload_url(
        &self,
        request: &CredentialRequest,
    ) -> Result<UploadCredentials> {
        let query = [
            ("file_type", request.kind.to_string()),
            ("file_extension", request.extension.clone()),
        ];

        let response: UploadUrlResponse = self
            .get(self.upload_url_endpoint(), &query)
            .await
            .with_context(|| {
                format!(
                    "Failed to get upload URL for {} (.{})",
                    request.kind, request.extension
                )
            })?;

        let credentials = response.into_credentials();
        if credentials.signed_write_url.is_empty() {
            anyhow::bail!("Upload URL response has an empty signed URL");
        }

        Ok(credentials)
    }

    /// Post a composed message.
    pub async fn post_message(&self, message: &OutgoingMessage) -> Result<()> {
        let attachments = message.attachments.as_ref().map_or(0, Vec::len);
        self.post_json(self.message_endpoint(), message)
            .await
            .context("Failed to send message")?;

        tracing::debug!(attachments, "Message posted");
        Ok(())
    }
}

#[async_trait]
impl CredentialIssuer for ApiClient {
    async fn issue(&self, request: &CredentialRequest) -> StorageResult<UploadCredentials> {
        self.request_upload_url(request)
            .await
            .map_err(|e| StorageError::CredentialsFailed(format!("{:#}", e)))
    }
}

#[async_trait]
impl SendTransport for ApiClient {
    async fn send_message(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        self.post_message(message).await
    }
}
