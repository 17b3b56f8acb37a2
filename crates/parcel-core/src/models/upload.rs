use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one file in a compose session.
///
/// `SizeRejected` is assigned at intake only and never changes; the file has
/// to be removed. `RemoteRejected` covers any credential or transfer failure
/// and can be retried, which moves it back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Succeeded,
    RemoteRejected,
    SizeRejected,
}

impl UploadStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, UploadStatus::Pending)
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            UploadStatus::RemoteRejected | UploadStatus::SizeRejected
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadStatus::RemoteRejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Succeeded => "succeeded",
            UploadStatus::RemoteRejected => "remote_rejected",
            UploadStatus::SizeRejected => "size_rejected",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
