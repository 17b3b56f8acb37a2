//! Shared key generation for storage backends.
//!
//! Key format: `attachments/{kind}/{uuid}.{extension}` (no trailing dot when
//! the file has no extension).

use parcel_core::FileKind;
use uuid::Uuid;

/// Generate a fresh storage key for a file of the given kind and extension.
pub fn generate_storage_key(kind: FileKind, extension: &str) -> String {
    let id = Uuid::new_v4();
    let extension = sanitize_extension(extension);
    if extension.is_empty() {
        format!("attachments/{}/{}", kind, id)
    } else {
        format!("attachments/{}/{}.{}", kind, id, extension)
    }
}

/// Keep only ASCII alphanumerics so an extension can never alter the key path.
fn sanitize_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect::<String>()
        .to_lowercase()
}
