//! Parcel Upload Engine
//!
//! Attachments for one chat compose session are selected, normalized and
//! uploaded concurrently, then composed into a single outgoing message.
//!
//! - [`intake`]: selection policy and normalization into [`FileRecord`]s.
//! - [`UploadRegistry`]: per-file state, cancellation and retry.
//! - [`compose`]: maps a settled registry to the attachment list.
//! - [`ComposeSession`]: text plus registry, and the submit flow.
//!
//! [`FileRecord`]: parcel_core::FileRecord

pub mod composer;
pub mod intake;
pub mod registry;
pub mod session;
pub mod task;

pub use composer::{compose, ComposeError};
pub use intake::{initial_status, intake, select_files};
pub use registry::{UploadRegistry, UploadSnapshot};
pub use session::{ComposeSession, SendTransport, SubmitError};
pub use task::{UploadFailure, UploadTask};
