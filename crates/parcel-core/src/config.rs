//! Configuration module
//!
//! Limits for the upload engine plus the settings needed to reach the chat
//! backend and the storage backend. Everything is read from the environment
//! (after loading `.env`), with defaults matching the product limits.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MESSAGE_ENDPOINT, DEFAULT_UPLOAD_TIMEOUT_SECS, DEFAULT_UPLOAD_URL_ENDPOINT,
    MAX_ATTACHMENTS, MAX_FILE_SIZE_BYTES, MAX_MESSAGE_LENGTH,
};
use crate::storage_types::StorageBackend;

const DEFAULT_API_URL: &str = "http://localhost:3000";

/// When the send control becomes available.
///
/// `Relaxed` enables submit as soon as no upload is in flight, even if some
/// files failed; submit then routes the user to the first failed file.
/// `Strict` additionally requires every file to have uploaded successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPolicy {
    #[default]
    Relaxed,
    Strict,
}

impl FromStr for SubmitPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relaxed" => Ok(SubmitPolicy::Relaxed),
            "strict" => Ok(SubmitPolicy::Strict),
            _ => Err(anyhow::anyhow!("Invalid submit policy: {}", s)),
        }
    }
}

/// Limits applied by the upload engine for one compose session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    pub max_attachments: usize,
    /// Message text ceiling in characters.
    pub max_text_length: usize,
    /// Per-attempt timeout; `None` leaves it to the transport.
    pub upload_timeout: Option<Duration>,
    pub submit_policy: SubmitPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            max_attachments: MAX_ATTACHMENTS,
            max_text_length: MAX_MESSAGE_LENGTH,
            upload_timeout: Some(Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS)),
            submit_policy: SubmitPolicy::Relaxed,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub upload: UploadConfig,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub api_url: String,
    pub api_key: Option<String>,
    pub upload_url_endpoint: String,
    pub message_endpoint: String,
}

/// Size ceiling in bytes from a `MAX_FILE_SIZE_MB` value.
fn parse_max_file_size(value: Option<&str>) -> Result<u64, anyhow::Error> {
    let Some(value) = value else {
        return Ok(MAX_FILE_SIZE_BYTES);
    };

    value
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("MAX_FILE_SIZE_MB must be a valid number"))?
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", value))
}

/// Per-attempt timeout from an `UPLOAD_TIMEOUT_SECONDS` value; 0 disables it.
fn parse_upload_timeout(value: Option<&str>) -> Result<Option<Duration>, anyhow::Error> {
    let secs = match value {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("UPLOAD_TIMEOUT_SECONDS must be a valid number"))?,
        None => DEFAULT_UPLOAD_TIMEOUT_SECS,
    };

    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_file_size_bytes = parse_max_file_size(env::var("MAX_FILE_SIZE_MB").ok().as_deref())?;

        let max_attachments = env::var("MAX_ATTACHMENTS")
            .unwrap_or_else(|_| MAX_ATTACHMENTS.to_string())
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("MAX_ATTACHMENTS must be a valid number"))?;

        let max_text_length = env::var("MAX_MESSAGE_LENGTH")
            .unwrap_or_else(|_| MAX_MESSAGE_LENGTH.to_string())
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("MAX_MESSAGE_LENGTH must be a valid number"))?;

        let upload_timeout = parse_upload_timeout(env::var("UPLOAD_TIMEOUT_SECONDS").ok().as_deref())?;

        let submit_policy = match env::var("SUBMIT_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => SubmitPolicy::default(),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Presigned,
        };

        let api_url = env::var("PARCEL_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_key = env::var("PARCEL_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok();

        Ok(Config {
            upload: UploadConfig {
                max_file_size_bytes,
                max_attachments,
                max_text_length,
                upload_timeout,
                submit_policy,
            },
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            api_url,
            api_key,
            upload_url_endpoint: env::var("PARCEL_UPLOAD_URL_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_URL_ENDPOINT.to_string()),
            message_endpoint: env::var("PARCEL_MESSAGE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_MESSAGE_ENDPOINT.to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload.max_attachments == 0 {
            return Err(anyhow::anyhow!("MAX_ATTACHMENTS must be at least 1"));
        }

        if self.upload.max_text_length == 0 {
            return Err(anyhow::anyhow!("MAX_MESSAGE_LENGTH must be at least 1"));
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be at least 1"));
        }

        if self.storage_backend == StorageBackend::Local
            && (self.local_storage_path.is_none() || self.local_storage_base_url.is_none())
        {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL"
            ));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!("PARCEL_API_URL must be an http(s) URL"));
        }

        Ok(())
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.upload
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.local_storage_base_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            upload: UploadConfig::default(),
            storage_backend: StorageBackend::Presigned,
            local_storage_path: None,
            local_storage_base_url: None,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            upload_url_endpoint: DEFAULT_UPLOAD_URL_ENDPOINT.to_string(),
            message_endpoint: DEFAULT_MESSAGE_ENDPOINT.to_string(),
        }
    }

    #[test]
    fn default_limits_match_product_constants() {
        let upload = UploadConfig::default();
        assert_eq!(upload.max_file_size_bytes, 30 * 1024 * 1024);
        assert_eq!(upload.max_attachments, 10);
        assert_eq!(upload.max_text_length, MAX_MESSAGE_LENGTH);
        assert_eq!(upload.submit_policy, SubmitPolicy::Relaxed);
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_local_backend_without_paths() {
        let mut config = base_config();
        config.storage_backend = StorageBackend::Local;
        assert!(config.validate().is_err());

        config.local_storage_path = Some("/tmp/parcel".to_string());
        config.local_storage_base_url = Some("http://localhost:8080/files".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_quota() {
        let mut config = base_config();
        config.upload.max_attachments = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_file_size_converts_megabytes() {
        assert_eq!(parse_max_file_size(None).unwrap(), MAX_FILE_SIZE_BYTES);
        assert_eq!(parse_max_file_size(Some("5")).unwrap(), 5 * 1024 * 1024);
    }

    #[test]
    fn max_file_size_rejects_overflow() {
        // 2^44 MB does not fit in u64 bytes.
        assert!(parse_max_file_size(Some("17592186044416")).is_err());
        assert!(parse_max_file_size(Some("17592186044446")).is_err());
        assert!(parse_max_file_size(Some(&u64::MAX.to_string())).is_err());
    }

    #[test]
    fn max_file_size_rejects_garbage() {
        assert!(parse_max_file_size(Some("thirty")).is_err());
        assert!(parse_max_file_size(Some("-1")).is_err());
    }

    #[test]
    fn upload_timeout_zero_disables() {
        assert_eq!(parse_upload_timeout(Some("0")).unwrap(), None);
        assert_eq!(
            parse_upload_timeout(None).unwrap(),
            Some(Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS))
        );
        assert!(parse_upload_timeout(Some("soon")).is_err());
    }

    #[test]
    fn submit_policy_parses() {
        assert_eq!("STRICT".parse::<SubmitPolicy>().unwrap(), SubmitPolicy::Strict);
        assert_eq!(" relaxed ".parse::<SubmitPolicy>().unwrap(), SubmitPolicy::Relaxed);
        assert!("sometimes".parse::<SubmitPolicy>().is_err());
    }
}
