//! Parcel Core Library
//!
//! Domain models, error types, configuration and file validation shared by
//! the upload engine, the storage backends, the API client and the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, SubmitPolicy, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    AdditionalInfo, Attachment, CredentialRequest, FileKind, FileRecord, OutgoingMessage,
    SelectedFile, UploadCredentials, UploadStatus,
};
pub use storage_types::StorageBackend;
