pub mod attachment;
pub mod credentials;
pub mod file;
pub mod upload;

pub use attachment::{AdditionalInfo, Attachment, OutgoingMessage};
pub use credentials::{CredentialRequest, UploadCredentials};
pub use file::{FileKind, FileRecord, SelectedFile};
pub use upload::UploadStatus;
