//! Compose session: message text plus the attachment registry, and the
//! submit flow that turns them into one outgoing message.

use std::sync::Arc;

use async_trait::async_trait;
use parcel_core::{OutgoingMessage, SelectedFile, UploadStatus};

use crate::composer::{compose, ComposeError};
use crate::registry::{UploadRegistry, UploadSnapshot};

/// Delivers a composed message to the chat backend.
#[async_trait]
pub trait SendTransport: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> anyhow::Result<()>;
}

/// Why a submit was refused or failed
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    Empty,

    #[error("attachments are still uploading")]
    NotSettled,

    #[error("message is {length} characters long; the limit is {max}")]
    TextTooLong { length: usize, max: usize },

    /// The UI should scroll to `id`.
    #[error("file {id} must be removed or retried before sending ({status})")]
    Unresolved { id: String, status: UploadStatus },

    #[error("failed to send message: {0}")]
    Transport(#[source] anyhow::Error),
}

impl From<ComposeError> for SubmitError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Unresolved { id, status } => SubmitError::Unresolved { id, status },
            ComposeError::InFlight { .. } => SubmitError::NotSettled,
        }
    }
}

/// One chat compose session. Owns its registry; closing the session cancels
/// every upload still running.
pub struct ComposeSession {
    registry: UploadRegistry,
    transport: Arc<dyn SendTransport>,
    text: String,
}

impl ComposeSession {
    pub fn new(registry: UploadRegistry, transport: Arc<dyn SendTransport>) -> Self {
        Self {
            registry,
            transport,
            text: String::new(),
        }
    }

    pub fn registry(&self) -> &UploadRegistry {
        &self.registry
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Hand a picker result to intake; see [`UploadRegistry::add_files`].
    pub fn attach(
        &self,
        selected: Vec<SelectedFile>,
        rejected_by_selector_limit: Vec<SelectedFile>,
    ) -> Vec<String> {
        self.registry.add_files(selected, rejected_by_selector_limit)
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.registry.cancel(id)
    }

    /// Drop a settled file; see [`UploadRegistry::remove`].
    pub fn remove(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    pub fn retry(&self, id: &str) -> bool {
        self.registry.retry(id)
    }

    pub fn attachments(&self) -> Vec<UploadSnapshot> {
        self.registry.snapshot()
    }

    pub fn remaining_quota(&self) -> usize {
        self.registry.remaining_quota()
    }

    fn text_length(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the send action should be enabled.
    pub fn can_submit(&self) -> bool {
        if self.text_length() > self.registry.config().max_text_length {
            return false;
        }
        if self.registry.is_empty() {
            return !self.text.trim().is_empty();
        }
        self.registry.can_submit()
    }

    /// Compose and send the message.
    ///
    /// With no attachments this sends a text-only message if the trimmed
    /// text is non-empty. On success the text and the registry are cleared;
    /// on any error both are left untouched.
    #[tracing::instrument(skip(self), fields(attachments = self.registry.len()))]
    pub async fn submit(&mut self) -> Result<OutgoingMessage, SubmitError> {
        let max = self.registry.config().max_text_length;
        let length = self.text_length();
        if length > max {
            return Err(SubmitError::TextTooLong { length, max });
        }

        let message = if self.registry.is_empty() {
            if self.text.trim().is_empty() {
                return Err(SubmitError::Empty);
            }
            OutgoingMessage {
                text: self.text.clone(),
                attachments: None,
            }
        } else {
            if !self.registry.is_settled() {
                return Err(SubmitError::NotSettled);
            }
            let attachments = compose(&self.registry.snapshot()).map_err(|err| {
                tracing::info!(file_id = %err.id(), "Submit blocked by unresolved file");
                SubmitError::from(err)
            })?;
            OutgoingMessage {
                text: self.text.clone(),
                attachments: Some(attachments),
            }
        };

        self.transport
            .send_message(&message)
            .await
            .map_err(SubmitError::Transport)?;

        tracing::info!("Message sent");
        self.text.clear();
        self.registry.clear();
        Ok(message)
    }

    /// Dismiss the attachment view: cancel and drop every attachment.
    pub fn close(&self) {
        self.registry.clear();
    }
}

impl Drop for ComposeSession {
    fn drop(&mut self) {
        self.registry.clear();
    }
}
