use serde::{Deserialize, Serialize};

use super::file::{FileKind, FileRecord};

/// Intake metadata carried along with an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    pub value_unit: FileKind,
    pub id: String,
    pub name: String,
    pub size: u64,
    pub extension: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&FileRecord> for AdditionalInfo {
    fn from(record: &FileRecord) -> Self {
        Self {
            value_unit: record.kind,
            id: record.id.clone(),
            name: record.name.clone(),
            size: record.byte_size,
            extension: record.extension.clone(),
            mime_type: record.mime_type.clone(),
            url: record.preview_url.clone(),
        }
    }
}

/// Attachment descriptor accepted by the message-send API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub file_url: String,
    pub additional_info: AdditionalInfo,
}

impl Attachment {
    pub fn new(record: &FileRecord, file_url: impl Into<String>) -> Self {
        Self {
            filename: record.name.clone(),
            file_url: file_url.into(),
            additional_info: AdditionalInfo::from(record),
        }
    }
}

/// Chat message handed to the send transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// `None` (serialized as `null`) for a text-only message.
    pub attachments: Option<Vec<Attachment>>,
}
