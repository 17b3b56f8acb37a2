//! HTTP client for the chat backend.
//!
//! Provides a minimal client with configurable auth (Bearer token or X-API-Key)
//! and generic GET/POST helpers. The domain methods in [`api`] request signed
//! upload URLs and post composed messages; the client implements
//! [`CredentialIssuer`](parcel_storage::CredentialIssuer) and
//! [`SendTransport`](parcel_upload::SendTransport) on top of them.

pub mod api;

use anyhow::{Context, Result};
use parcel_core::Config;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// HTTP client for the chat backend with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
    upload_url_endpoint: String,
    message_endpoint: String,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            upload_url_endpoint: parcel_core::constants::DEFAULT_UPLOAD_URL_ENDPOINT.to_string(),
            message_endpoint: parcel_core::constants::DEFAULT_MESSAGE_ENDPOINT.to_string(),
        })
    }

    /// Create client from loaded configuration. Uses X-API-Key auth.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Missing API key. Set PARCEL_API_KEY or API_KEY")?;

        Ok(Self::new(config.api_url.clone(), Auth::XApiKey(api_key))?
            .with_endpoints(&config.upload_url_endpoint, &config.message_endpoint))
    }

    /// Create client from environment: PARCEL_API_URL (or API_URL), PARCEL_API_KEY (or API_KEY).
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config)
    }

    pub fn with_endpoints(mut self, upload_url_endpoint: &str, message_endpoint: &str) -> Self {
        self.upload_url_endpoint = upload_url_endpoint.to_string();
        self.message_endpoint = message_endpoint.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn upload_url_endpoint(&self) -> &str {
        &self.upload_url_endpoint
    }

    pub fn message_endpoint(&self) -> &str {
        &self.message_endpoint
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.build_url(path);
        let mut request = self.client.get(&url);
        request = self.apply_auth(request);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.context("Failed to send request")?;
        let response = ensure_success(response).await?;

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// POST JSON body, ignoring the response body.
    pub async fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.build_url(path);
        let request = self.client.post(&url).json(body);
        let request = self.apply_auth(request);

        let response = request.send().await.context("Failed to send request")?;
        ensure_success(response).await?;

        Ok(())
    }

    /// Raw client for custom requests. Caller must apply auth via build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(anyhow::anyhow!(
        "API request failed with status {}: {}",
        status,
        error_text
    ))
}
