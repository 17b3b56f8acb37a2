use crate::traits::{ByteTransfer, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

/// Direct-to-object-storage transfer through presigned PUT URLs
#[derive(Clone, Debug)]
pub struct PresignedTransfer {
    client: Client,
}

impl PresignedTransfer {
    /// Create a transfer with its own HTTP client.
    ///
    /// No request timeout is set on the client; the upload engine bounds each
    /// attempt and cancels through the token.
    pub fn new() -> StorageResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteTransfer for PresignedTransfer {
    async fn put(
        &self,
        signed_write_url: &str,
        content_type: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let size = body.len();
        let start = std::time::Instant::now();
        let request = self
            .client
            .put(signed_write_url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(size_bytes = size, "Presigned upload cancelled");
                return Err(StorageError::Cancelled);
            }
            result = request => result
                .map_err(|e| StorageError::UploadFailed(format!("PUT request failed: {}", e)))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed(format!(
                "PUT returned status {}: {}",
                status, body
            )));
        }

        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        tracing::info!(
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Presigned upload successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Presigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_sends_body_and_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/bucket/photo.png")
            .match_header("content-type", "image/png")
            .match_body("png-bytes")
            .with_status(200)
            .create_async()
            .await;

        let transfer = PresignedTransfer::new().unwrap();
        let url = format!("{}/bucket/photo.png", server.url());
        transfer
            .put(
                &url,
                "image/png",
                Bytes::from_static(b"png-bytes"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_put_non_success_status_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/bucket/doc.pdf")
            .with_status(403)
            .with_body("SignatureDoesNotMatch")
            .create_async()
            .await;

        let transfer = PresignedTransfer::new().unwrap();
        let url = format!("{}/bucket/doc.pdf", server.url());
        let result = transfer
            .put(
                &url,
                "application/pdf",
                Bytes::from_static(b"%PDF"),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(StorageError::UploadFailed(msg)) => assert!(msg.contains("403")),
            other => panic!("expected UploadFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_with_cancelled_token_never_sends() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/bucket/a.txt")
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let transfer = PresignedTransfer::new().unwrap();
        let url = format!("{}/bucket/a.txt", server.url());
        let result = transfer
            .put(&url, "text/plain", Bytes::from_static(b"a"), &cancel)
            .await;

        assert!(matches!(result, Err(StorageError::Cancelled)));
        mock.assert_async().await;
    }
}
