//! Limits shared by intake, the registry and configuration defaults.

/// Largest file accepted for upload (30 MB). Bigger files are kept in the
/// session with a size error and never reach the network.
pub const MAX_FILE_SIZE_BYTES: u64 = 30 * 1024 * 1024;

/// Maximum number of attachments in one compose session.
pub const MAX_ATTACHMENTS: usize = 10;

/// Default per-attempt timeout covering the credential request and the transfer.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Default path of the upload-URL endpoint on the chat backend.
pub const DEFAULT_UPLOAD_URL_ENDPOINT: &str = "/api/v1/uploads";

/// Default path messages are posted to.
pub const DEFAULT_MESSAGE_ENDPOINT: &str = "/api/v1/messages";

/// Longest message text accepted by submit, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4096;
