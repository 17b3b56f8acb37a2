//! Parcel Storage Library
//!
//! Collaborator traits for uploads and their implementations:
//!
//! - [`CredentialIssuer`]: returns a destination URL and a short-lived signed
//!   write URL for a file, keyed by file kind and extension.
//! - [`ByteTransfer`]: writes the file body to the signed URL and honours a
//!   cancellation token.
//!
//! The presigned backend PUTs straight to object storage; credentials for it
//! come from the chat backend. The local backend implements both traits on a
//! directory, using keys of the form `attachments/{kind}/{uuid}.{ext}` (see
//! the `keys` module).

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-presigned")]
pub mod presigned;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use factory::{create_storage, StorageBackends};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use parcel_core::StorageBackend;
#[cfg(feature = "storage-presigned")]
pub use presigned::PresignedTransfer;
pub use traits::{ByteTransfer, CredentialIssuer, StorageError, StorageResult};
