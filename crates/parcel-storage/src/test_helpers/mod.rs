//! Test helpers shared with dependent crates (enable the `test-helpers` feature)

pub mod mock_storage;

pub use mock_storage::{MockCredentialIssuer, MockTransfer, TransferBehavior};
