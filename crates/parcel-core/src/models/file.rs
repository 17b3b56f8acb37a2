use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::validation::{detect_kind, detect_mime_type, file_extension};

/// Attachment kind, derived from MIME type and extension at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Document,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Document => "document",
        }
    }

    /// Images and videos get a local preview in the attachment list.
    pub fn has_preview(&self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file as handed over by the picker, before intake.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// MIME type reported by the picker, if any.
    pub mime_type: Option<String>,
    pub data: Bytes,
    /// Where the file was read from; used to build a local preview reference.
    pub source_path: Option<PathBuf>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
            source_path: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk. Rejects paths with parent-directory components.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(AppError::InvalidInput(format!(
                "Invalid path: {}",
                path.display()
            )));
        }

        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput(format!("No file name: {}", path.display())))?;

        Ok(Self {
            name,
            mime_type: None,
            data: Bytes::from(data),
            source_path: Some(path.to_path_buf()),
        })
    }

    pub fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// One user-selected file after intake. Immutable for its whole lifetime in a session.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Registry key and UI anchor for scroll-to-error.
    pub id: String,
    pub kind: FileKind,
    pub name: String,
    pub byte_size: u64,
    /// Lowercase extension without the dot; empty when the name has none.
    pub extension: String,
    pub mime_type: String,
    pub raw_bytes: Bytes,
    pub preview_url: Option<String>,
}

impl FileRecord {
    /// Normalize a selected file, assigning it a fresh id.
    pub fn prepare(selected: SelectedFile) -> Self {
        let extension = file_extension(&selected.name);
        let mime_type = selected
            .mime_type
            .clone()
            .unwrap_or_else(|| detect_mime_type(&selected.name));
        let kind = detect_kind(&mime_type, &extension);
        let preview_url = match (&selected.source_path, kind.has_preview()) {
            (Some(path), true) => Some(format!("file://{}", path.display())),
            _ => None,
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            byte_size: selected.byte_size(),
            name: selected.name,
            extension,
            mime_type,
            raw_bytes: selected.data,
            preview_url,
        }
    }

    pub fn exceeds(&self, max_file_size_bytes: u64) -> bool {
        self.byte_size > max_file_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_derives_metadata() {
        let record = FileRecord::prepare(SelectedFile::new("Holiday.JPG", vec![0u8; 64]));
        assert_eq!(record.kind, FileKind::Image);
        assert_eq!(record.extension, "jpg");
        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.byte_size, 64);
        assert!(record.preview_url.is_none());
    }

    #[test]
    fn prepare_prefers_picker_mime_type() {
        let selected = SelectedFile::new("recording", vec![1, 2, 3]).with_mime_type("video/mp4");
        let record = FileRecord::prepare(selected);
        assert_eq!(record.kind, FileKind::Video);
        assert_eq!(record.extension, "");
    }

    #[test]
    fn prepare_assigns_distinct_ids() {
        let a = FileRecord::prepare(SelectedFile::new("a.pdf", vec![]));
        let b = FileRecord::prepare(SelectedFile::new("a.pdf", vec![]));
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, FileKind::Document);
    }

    #[tokio::test]
    async fn from_path_reads_file_and_sets_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        tokio::fs::write(&path, b"png-bytes").await.unwrap();

        let selected = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(selected.name, "photo.png");
        assert_eq!(selected.byte_size(), 9);

        let record = FileRecord::prepare(selected);
        assert!(record.preview_url.unwrap().ends_with("photo.png"));
    }

    #[tokio::test]
    async fn from_path_rejects_parent_components() {
        let result = SelectedFile::from_path("../secrets.txt").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
