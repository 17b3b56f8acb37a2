//! Builds the outgoing attachment list from a settled registry.

use parcel_core::{Attachment, UploadStatus};

use crate::registry::UploadSnapshot;

/// Why the attachment list could not be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    /// A file failed and must be removed or retried first. `id` is the first
    /// such file in registry order, for the UI to scroll to.
    #[error("file {id} is unresolved ({status})")]
    Unresolved { id: String, status: UploadStatus },

    #[error("file {id} is still uploading")]
    InFlight { id: String },
}

impl ComposeError {
    pub fn id(&self) -> &str {
        match self {
            ComposeError::Unresolved { id, .. } | ComposeError::InFlight { id } => id,
        }
    }
}

/// Map every entry to an attachment, in registry order.
///
/// Fails on the first entry in a failed state; failing that, on the first
/// entry still uploading. Never emits an attachment for a file that has not
/// succeeded.
pub fn compose(entries: &[UploadSnapshot]) -> Result<Vec<Attachment>, ComposeError> {
    if let Some(failed) = entries.iter().find(|e| e.status.is_error()) {
        return Err(ComposeError::Unresolved {
            id: failed.id().to_string(),
            status: failed.status,
        });
    }

    if let Some(pending) = entries.iter().find(|e| e.status.is_pending()) {
        return Err(ComposeError::InFlight {
            id: pending.id().to_string(),
        });
    }

    Ok(entries
        .iter()
        .filter(|e| e.status == UploadStatus::Succeeded)
        .map(|e| Attachment::new(&e.record, e.final_url.clone()))
        .collect())
}
