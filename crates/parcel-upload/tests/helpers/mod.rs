//! Test helpers: build a registry or session over in-memory collaborators.
//!
//! Run from workspace root: `cargo test -p parcel-upload`.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use parcel_core::{OutgoingMessage, UploadConfig};
use parcel_storage::test_helpers::{MockCredentialIssuer, MockTransfer};
use parcel_upload::{ComposeSession, SendTransport, UploadRegistry};
use std::sync::{Arc, Mutex};

/// Registry plus handles on its collaborators.
pub struct TestRegistry {
    pub registry: UploadRegistry,
    pub issuer: Arc<MockCredentialIssuer>,
    pub transfer: Arc<MockTransfer>,
}

pub fn setup_registry(config: UploadConfig, transfer: MockTransfer) -> TestRegistry {
    let issuer = Arc::new(MockCredentialIssuer::new());
    let transfer = Arc::new(transfer);
    let registry = UploadRegistry::new(config, issuer.clone(), transfer.clone());
    TestRegistry {
        registry,
        issuer,
        transfer,
    }
}

/// Send transport that records every message it is given.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SendTransport for RecordingTransport {
    async fn send_message(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestSession {
    pub session: ComposeSession,
    pub issuer: Arc<MockCredentialIssuer>,
    pub transfer: Arc<MockTransfer>,
    pub transport: Arc<RecordingTransport>,
}

pub fn setup_session(config: UploadConfig, transfer: MockTransfer) -> TestSession {
    let TestRegistry {
        registry,
        issuer,
        transfer,
    } = setup_registry(config, transfer);
    let transport = Arc::new(RecordingTransport::default());
    let session = ComposeSession::new(registry, transport.clone());
    TestSession {
        session,
        issuer,
        transfer,
        transport,
    }
}
