//! Upload registry: the single authoritative store of per-file upload state
//! for one compose session.
//!
//! Every mutation goes through one lock, so a completion that races with a
//! cancel or a clear is decided in one place. Each upload attempt carries a
//! generation number; completions are applied only when both the file id and
//! the generation still match a `Pending` entry. A completion for a removed
//! file, or for an attempt superseded by a retry, is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use parcel_core::{FileRecord, SelectedFile, SubmitPolicy, UploadConfig, UploadStatus};
use parcel_storage::{ByteTransfer, CredentialIssuer};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::intake::{initial_status, intake};
use crate::task::UploadTask;

/// Read-only view of one registry entry.
#[derive(Debug, Clone)]
pub struct UploadSnapshot {
    pub record: Arc<FileRecord>,
    pub status: UploadStatus,
    /// Destination URL; empty until the upload succeeds.
    pub final_url: String,
    /// Number of upload attempts started for this file.
    pub attempts: u32,
}

impl UploadSnapshot {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// How an upload attempt ended, as reported by its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Uploaded { destination_url: String },
    /// Credential or transfer failure: the entry becomes `RemoteRejected`.
    Failed,
    /// The attempt observed its cancellation token: the entry is removed.
    Cancelled,
}

struct UploadEntry {
    record: Arc<FileRecord>,
    status: UploadStatus,
    final_url: String,
    /// Present only while an attempt is running.
    cancel: Option<CancellationToken>,
    generation: u64,
    attempts: u32,
}

impl UploadEntry {
    fn snapshot(&self) -> UploadSnapshot {
        UploadSnapshot {
            record: self.record.clone(),
            status: self.status,
            final_url: self.final_url.clone(),
            attempts: self.attempts,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Most recently added first.
    entries: Vec<UploadEntry>,
    next_generation: u64,
}

impl RegistryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.record.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut UploadEntry> {
        self.entries.iter_mut().find(|e| e.record.id == id)
    }
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    config: UploadConfig,
    issuer: Arc<dyn CredentialIssuer>,
    transfer: Arc<dyn ByteTransfer>,
    /// Bumped after every mutation.
    revision: watch::Sender<u64>,
}

/// Per-session upload registry. Cheap to clone; clones share state.
///
/// Methods that start uploads (`add_files`, `start`, `retry`) spawn onto the
/// current Tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct UploadRegistry {
    inner: Arc<RegistryInner>,
}

impl UploadRegistry {
    pub fn new(
        config: UploadConfig,
        issuer: Arc<dyn CredentialIssuer>,
        transfer: Arc<dyn ByteTransfer>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
                config,
                issuer,
                transfer,
                revision,
            }),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }

    pub(crate) fn issuer(&self) -> &Arc<dyn CredentialIssuer> {
        &self.inner.issuer
    }

    pub(crate) fn transfer(&self) -> &Arc<dyn ByteTransfer> {
        &self.inner.transfer
    }

    pub(crate) fn upload_timeout(&self) -> Option<Duration> {
        self.inner.config.upload_timeout
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // State is updated in single assignments, so a poisoned lock still
        // holds a consistent registry.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called after the state lock has been released.
    fn notify(&self) {
        self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Subscribe to change notifications. The value is a revision counter
    /// bumped after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Run intake on a picker result, register every produced record and
    /// start uploads for those accepted as `Pending`.
    ///
    /// Returns the ids of the registered files, in intake order.
    pub fn add_files(
        &self,
        selected: Vec<SelectedFile>,
        rejected_by_selector_limit: Vec<SelectedFile>,
    ) -> Vec<String> {
        let records = intake(selected, rejected_by_selector_limit, self.remaining_quota());
        let mut added = Vec::with_capacity(records.len());

        for record in records {
            let id = record.id.clone();
            if !self.enqueue(record) {
                continue;
            }
            self.start(&id);
            added.push(id);
        }

        added
    }

    /// Insert a record at the front of the registry without starting its
    /// upload. Oversized records enter as `SizeRejected`.
    ///
    /// No-op returning `false` when the registry is full or the id is
    /// already present.
    pub fn enqueue(&self, record: FileRecord) -> bool {
        let status = initial_status(&record, self.inner.config.max_file_size_bytes);
        let max_attachments = self.inner.config.max_attachments;

        {
            let mut state = self.lock();
            if state.entries.len() >= max_attachments {
                tracing::warn!(
                    file_id = %record.id,
                    max_attachments,
                    "Attachment quota reached, dropping file"
                );
                return false;
            }
            if state.position(&record.id).is_some() {
                tracing::warn!(file_id = %record.id, "Duplicate file id, ignoring");
                return false;
            }

            if status == UploadStatus::SizeRejected {
                tracing::info!(
                    file_id = %record.id,
                    byte_size = record.byte_size,
                    max_file_size_bytes = self.inner.config.max_file_size_bytes,
                    "File exceeds size ceiling"
                );
            }

            state.entries.insert(
                0,
                UploadEntry {
                    record: Arc::new(record),
                    status,
                    final_url: String::new(),
                    cancel: None,
                    generation: 0,
                    attempts: 0,
                },
            );
        }

        self.notify();
        true
    }

    /// Start the upload of an enqueued `Pending` file that has no attempt
    /// running yet.
    pub fn start(&self, id: &str) -> bool {
        self.begin_attempt(id, false)
    }

    /// Cancel the in-flight upload of a `Pending` file and remove it.
    ///
    /// The task's outcome, whenever it arrives, is discarded. Returns `false`
    /// for unknown ids and for files that are not `Pending`.
    pub fn cancel(&self, id: &str) -> bool {
        {
            let mut state = self.lock();
            let Some(pos) = state.position(id) else {
                return false;
            };
            if !state.entries[pos].status.is_pending() {
                return false;
            }

            let entry = state.entries.remove(pos);
            if let Some(token) = entry.cancel {
                token.cancel();
            }
        }

        tracing::info!(file_id = %id, "Upload cancelled");
        self.notify();
        true
    }

    /// Remove a settled file.
    ///
    /// Refuses `Pending` entries and returns `false`: an upload still running
    /// has to go through [`UploadRegistry::cancel`], which stops the transfer
    /// and drops the entry.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            match state.position(id) {
                Some(pos) if state.entries[pos].status.is_pending() => {
                    tracing::warn!(file_id = %id, "Refusing to remove an upload in flight; cancel it instead");
                    None
                }
                Some(pos) => Some(state.entries.remove(pos)),
                None => None,
            }
        };

        match removed {
            Some(entry) => {
                tracing::debug!(file_id = %id, status = %entry.status, "File removed");
                self.notify();
                true
            }
            None => false,
        }
    }

    /// Retry a `RemoteRejected` upload under a fresh cancellation token.
    ///
    /// No-op returning `false` for any other status.
    pub fn retry(&self, id: &str) -> bool {
        self.begin_attempt(id, true)
    }

    /// Cancel every in-flight upload and empty the registry.
    pub fn clear(&self) {
        let cleared = {
            let mut state = self.lock();
            for entry in state.entries.iter() {
                if let Some(token) = &entry.cancel {
                    token.cancel();
                }
            }
            let count = state.entries.len();
            state.entries.clear();
            count
        };

        if cleared > 0 {
            tracing::debug!(cleared, "Registry cleared");
        }
        self.notify();
    }

    /// True when no file is `Pending`. An empty registry is settled.
    pub fn is_settled(&self) -> bool {
        self.lock().entries.iter().all(|e| !e.status.is_pending())
    }

    pub fn has_errors(&self) -> bool {
        self.lock().entries.iter().any(|e| e.status.is_error())
    }

    /// First failed file in registry order, if any.
    pub fn first_error(&self) -> Option<UploadSnapshot> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.status.is_error())
            .map(UploadEntry::snapshot)
    }

    /// Whether submit is allowed under the configured policy, ignoring the
    /// message text.
    pub fn can_submit(&self) -> bool {
        let state = self.lock();
        let settled = state.entries.iter().all(|e| !e.status.is_pending());
        match self.inner.config.submit_policy {
            SubmitPolicy::Relaxed => settled,
            SubmitPolicy::Strict => {
                settled && state.entries.iter().all(|e| !e.status.is_error())
            }
        }
    }

    /// All entries, most recently added first.
    pub fn snapshot(&self) -> Vec<UploadSnapshot> {
        self.lock().entries.iter().map(UploadEntry::snapshot).collect()
    }

    pub fn get(&self, id: &str) -> Option<UploadSnapshot> {
        let state = self.lock();
        state
            .entries
            .iter()
            .find(|e| e.record.id == id)
            .map(UploadEntry::snapshot)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn remaining_quota(&self) -> usize {
        self.inner
            .config
            .max_attachments
            .saturating_sub(self.len())
    }

    /// Wait until no file is `Pending`.
    pub async fn wait_settled(&self) {
        let mut changes = self.subscribe();
        loop {
            if self.is_settled() {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    fn begin_attempt(&self, id: &str, retry: bool) -> bool {
        let task = {
            let mut state = self.lock();
            state.next_generation += 1;
            let generation = state.next_generation;

            let Some(entry) = state.find_mut(id) else {
                return false;
            };
            let eligible = if retry {
                entry.status.is_retryable()
            } else {
                entry.status.is_pending() && entry.cancel.is_none()
            };
            if !eligible {
                return false;
            }

            let token = CancellationToken::new();
            entry.status = UploadStatus::Pending;
            entry.final_url.clear();
            entry.cancel = Some(token.clone());
            entry.generation = generation;
            entry.attempts += 1;

            tracing::debug!(
                file_id = %id,
                attempt = entry.attempts,
                retry,
                "Starting upload attempt"
            );

            UploadTask::new(self.clone(), entry.record.clone(), generation, token)
        };

        self.notify();
        task.spawn();
        true
    }

    /// Apply an attempt's outcome. Returns `false` when the outcome is stale
    /// because the file was removed or the attempt was superseded.
    ///
    /// A cancelled attempt never succeeds: its entry is removed instead.
    pub(crate) fn settle(&self, id: &str, generation: u64, outcome: AttemptOutcome) -> bool {
        {
            let mut state = self.lock();
            let Some(pos) = state.position(id) else {
                return false;
            };
            let entry = &mut state.entries[pos];
            if entry.generation != generation || !entry.status.is_pending() {
                return false;
            }
            let cancelled = entry.cancel.as_ref().map_or(true, |t| t.is_cancelled());

            if cancelled || outcome == AttemptOutcome::Cancelled {
                state.entries.remove(pos);
            } else {
                entry.cancel = None;
                match outcome {
                    AttemptOutcome::Uploaded { destination_url } => {
                        entry.status = UploadStatus::Succeeded;
                        entry.final_url = destination_url;
                    }
                    AttemptOutcome::Failed => {
                        entry.status = UploadStatus::RemoteRejected;
                    }
                    AttemptOutcome::Cancelled => {}
                }
            }
        }

        self.notify();
        true
    }
}

impl std::fmt::Debug for UploadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRegistry")
            .field("entries", &self.snapshot())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_storage::test_helpers::{MockCredentialIssuer, MockTransfer, TransferBehavior};

    fn registry_with(
        config: UploadConfig,
        transfer: Arc<MockTransfer>,
    ) -> (UploadRegistry, Arc<MockCredentialIssuer>) {
        let issuer = Arc::new(MockCredentialIssuer::new());
        (UploadRegistry::new(config, issuer.clone(), transfer), issuer)
    }

    fn record(name: &str, size: usize) -> FileRecord {
        FileRecord::prepare(SelectedFile::new(name, vec![1u8; size]))
    }

    #[tokio::test]
    async fn enqueue_prepends() {
        let (registry, _) = registry_with(UploadConfig::default(), Arc::new(MockTransfer::new()));
        let a = record("a.png", 4);
        let b = record("b.png", 4);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());

        assert!(registry.enqueue(a));
        assert!(registry.enqueue(b));

        let ids: Vec<String> = registry.snapshot().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec![b_id, a_id]);
    }

    #[tokio::test]
    async fn enqueue_rejects_duplicates_and_overflow() {
        let config = UploadConfig {
            max_attachments: 2,
            ..UploadConfig::default()
        };
        let (registry, _) = registry_with(config, Arc::new(MockTransfer::new()));
        let a = record("a.png", 4);

        assert!(registry.enqueue(a.clone()));
        assert!(!registry.enqueue(a));
        assert!(registry.enqueue(record("b.png", 4)));
        assert!(!registry.enqueue(record("c.png", 4)));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.remaining_quota(), 0);
    }

    #[tokio::test]
    async fn size_rejected_files_never_start() {
        let config = UploadConfig {
            max_file_size_bytes: 8,
            ..UploadConfig::default()
        };
        let transfer = Arc::new(MockTransfer::new());
        let (registry, issuer) = registry_with(config, transfer.clone());

        let ids = registry.add_files(vec![SelectedFile::new("big.pdf", vec![0u8; 9])], Vec::new());
        assert_eq!(ids.len(), 1);
        assert!(!registry.start(&ids[0]));
        assert!(!registry.retry(&ids[0]));

        let entry = registry.get(&ids[0]).unwrap();
        assert_eq!(entry.status, UploadStatus::SizeRejected);
        assert_eq!(entry.attempts, 0);
        assert!(registry.is_settled());
        assert_eq!(issuer.call_count(), 0);
        assert_eq!(transfer.call_count(), 0);
    }

    #[tokio::test]
    async fn settled_upload_records_destination() {
        let (registry, _) = registry_with(UploadConfig::default(), Arc::new(MockTransfer::new()));
        let ids = registry.add_files(vec![SelectedFile::new("cat.png", vec![1u8; 16])], Vec::new());

        registry.wait_settled().await;

        let entry = registry.get(&ids[0]).unwrap();
        assert_eq!(entry.status, UploadStatus::Succeeded);
        assert_eq!(entry.final_url, "https://cdn.example.com/image/1.png");
    }

    #[tokio::test]
    async fn stale_generation_is_ignored() {
        let transfer = Arc::new(MockTransfer::with_default(TransferBehavior::Block));
        let (registry, _) = registry_with(UploadConfig::default(), transfer);
        let r = record("a.png", 4);
        let id = r.id.clone();
        registry.enqueue(r);
        registry.start(&id);

        let applied = registry.settle(
            &id,
            0,
            AttemptOutcome::Uploaded {
                destination_url: "https://stale".to_string(),
            },
        );

        assert!(!applied);
        assert_eq!(registry.get(&id).unwrap().status, UploadStatus::Pending);
        registry.clear();
    }

    #[tokio::test]
    async fn remove_refuses_pending_entries() {
        let transfer = Arc::new(MockTransfer::with_default(TransferBehavior::Block));
        let (registry, _) = registry_with(UploadConfig::default(), transfer.clone());
        let ids = registry.add_files(vec![SelectedFile::new("a.png", vec![1u8; 4])], Vec::new());

        transfer.wait_for_calls(1).await;
        assert!(!registry.remove(&ids[0]));
        assert_eq!(registry.get(&ids[0]).unwrap().status, UploadStatus::Pending);
        assert_eq!(transfer.cancelled_count(), 0);

        // The transfer keeps running and still lands on the entry.
        transfer.release();
        registry.wait_settled().await;
        assert_eq!(registry.get(&ids[0]).unwrap().status, UploadStatus::Succeeded);

        assert!(registry.remove(&ids[0]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn cancel_then_remove_is_a_noop() {
        let transfer = Arc::new(MockTransfer::with_default(TransferBehavior::Block));
        let (registry, _) = registry_with(UploadConfig::default(), transfer.clone());
        let ids = registry.add_files(vec![SelectedFile::new("a.png", vec![1u8; 4])], Vec::new());

        transfer.wait_for_calls(1).await;
        assert!(registry.cancel(&ids[0]));
        assert!(!registry.remove(&ids[0]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn cancel_ignores_settled_files() {
        let transfer = Arc::new(MockTransfer::with_default(TransferBehavior::Fail));
        let (registry, _) = registry_with(UploadConfig::default(), transfer);
        let ids = registry.add_files(vec![SelectedFile::new("a.png", vec![1u8; 4])], Vec::new());

        registry.wait_settled().await;

        assert!(!registry.cancel(&ids[0]));
        assert_eq!(
            registry.get(&ids[0]).unwrap().status,
            UploadStatus::RemoteRejected
        );
    }

    #[tokio::test]
    async fn strict_policy_blocks_on_errors() {
        let transfer = Arc::new(MockTransfer::with_default(TransferBehavior::Fail));
        let config = UploadConfig {
            submit_policy: SubmitPolicy::Strict,
            ..UploadConfig::default()
        };
        let (registry, _) = registry_with(config, transfer);
        registry.add_files(vec![SelectedFile::new("a.png", vec![1u8; 4])], Vec::new());

        registry.wait_settled().await;

        assert!(registry.is_settled());
        assert!(registry.has_errors());
        assert!(!registry.can_submit());
    }

    #[tokio::test]
    async fn empty_registry_is_settled() {
        let (registry, _) = registry_with(UploadConfig::default(), Arc::new(MockTransfer::new()));
        assert!(registry.is_settled());
        assert!(registry.can_submit());
        assert!(registry.first_error().is_none());
        registry.wait_settled().await;
    }
}
