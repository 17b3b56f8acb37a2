//! In-memory collaborators for testing the upload engine

use crate::traits::{ByteTransfer, CredentialIssuer, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use parcel_core::{CredentialRequest, UploadCredentials};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Credential issuer that counts calls and fails on demand
pub struct MockCredentialIssuer {
    calls: Mutex<Vec<CredentialRequest>>,
    failures: Mutex<VecDeque<bool>>,
    fail_all: Mutex<bool>,
}

impl MockCredentialIssuer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            fail_all: Mutex::new(false),
        }
    }

    /// Make the next `n` requests fail.
    pub fn fail_next(&self, n: usize) {
        let mut failures = self.failures.lock().unwrap();
        failures.extend(std::iter::repeat(true).take(n));
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CredentialRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Destination URL returned for the `n`-th request (1-based).
    pub fn destination_url(n: usize, request: &CredentialRequest) -> String {
        format!(
            "https://cdn.example.com/{}/{}.{}",
            request.kind, n, request.extension
        )
    }
}

impl Default for MockCredentialIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialIssuer for MockCredentialIssuer {
    async fn issue(&self, request: &CredentialRequest) -> StorageResult<UploadCredentials> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len()
        };

        let scripted_failure = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if scripted_failure || *self.fail_all.lock().unwrap() {
            return Err(StorageError::CredentialsFailed(
                "mock issuer rejected the request".to_string(),
            ));
        }

        Ok(UploadCredentials {
            destination_url: Self::destination_url(n, request),
            signed_write_url: format!("https://upload.example.com/{}?signature=mock", n),
        })
    }
}

/// What a [`MockTransfer`] does with one `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferBehavior {
    Succeed,
    Fail,
    /// Wait until cancelled or until [`MockTransfer::release`] is called, then succeed.
    Block,
}

/// Byte transfer that stores bodies in memory and follows a script
pub struct MockTransfer {
    script: Mutex<VecDeque<TransferBehavior>>,
    default_behavior: Mutex<TransferBehavior>,
    files: Mutex<HashMap<String, Bytes>>,
    calls_tx: watch::Sender<usize>,
    released_tx: watch::Sender<bool>,
    cancelled: Mutex<usize>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::with_default(TransferBehavior::Succeed)
    }

    pub fn with_default(behavior: TransferBehavior) -> Self {
        let (calls_tx, _) = watch::channel(0);
        let (released_tx, _) = watch::channel(false);
        Self {
            script: Mutex::new(VecDeque::new()),
            default_behavior: Mutex::new(behavior),
            files: Mutex::new(HashMap::new()),
            calls_tx,
            released_tx,
            cancelled: Mutex::new(0),
        }
    }

    /// Queue behaviors for the next calls; afterwards the default applies.
    pub fn push_behavior(&self, behavior: TransferBehavior) {
        self.script.lock().unwrap().push_back(behavior);
    }

    pub fn set_default(&self, behavior: TransferBehavior) {
        *self.default_behavior.lock().unwrap() = behavior;
    }

    /// Let every blocked (and future blocked) transfer complete successfully.
    pub fn release(&self) {
        self.released_tx.send_replace(true);
    }

    pub fn call_count(&self) -> usize {
        *self.calls_tx.borrow()
    }

    pub fn cancelled_count(&self) -> usize {
        *self.cancelled.lock().unwrap()
    }

    pub fn stored_files(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn get_file(&self, signed_write_url: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(signed_write_url).cloned()
    }

    /// Wait until at least `n` transfers have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls_tx.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }
}

impl Default for MockTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteTransfer for MockTransfer {
    async fn put(
        &self,
        signed_write_url: &str,
        _content_type: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.default_behavior.lock().unwrap());
        self.calls_tx.send_modify(|calls| *calls += 1);

        match behavior {
            TransferBehavior::Succeed => {}
            TransferBehavior::Fail => {
                return Err(StorageError::UploadFailed(
                    "mock network error".to_string(),
                ))
            }
            TransferBehavior::Block => {
                let mut released = self.released_tx.subscribe();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        *self.cancelled.lock().unwrap() += 1;
                        return Err(StorageError::Cancelled);
                    }
                    _ = released.wait_for(|r| *r) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            *self.cancelled.lock().unwrap() += 1;
            return Err(StorageError::Cancelled);
        }

        self.files
            .lock()
            .unwrap()
            .insert(signed_write_url.to_string(), body);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Presigned
    }
}
