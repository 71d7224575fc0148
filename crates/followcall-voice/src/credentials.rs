//! Sources of the secret that authorises a voice session.

use crate::error::VoiceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// A secret accepted by the remote voice platform.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Supplies short-lived or static session credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches credentials. A missing secret is a
    /// [`VoiceError::Configuration`] error.
    async fn fetch(&self) -> Result<Credentials, VoiceError>;
}

/// Credentials known up front (e.g. from configuration).
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Option<Credentials>,
}

impl StaticCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            credentials: (!api_key.trim().is_empty()).then(|| Credentials::new(api_key)),
        }
    }

    /// A provider that always reports the secret as unconfigured.
    pub fn missing() -> Self {
        Self { credentials: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn fetch(&self) -> Result<Credentials, VoiceError> {
        self.credentials
            .clone()
            .ok_or_else(|| VoiceError::Configuration("voice API key is not configured".to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialResponse {
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Fetches credentials from an HTTP endpoint that answers
/// `{"apiKey": "..."}`, such as the server's `GET /api/voice/credentials`.
#[derive(Debug, Clone)]
pub struct HttpCredentialProvider {
    url: String,
    http: reqwest::Client,
}

impl HttpCredentialProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(&self) -> Result<Credentials, VoiceError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(VoiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CredentialResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))?;

        match body.api_key {
            Some(key) if !key.trim().is_empty() => Ok(Credentials::new(key)),
            _ => Err(VoiceError::Configuration(
                "credential endpoint returned no API key".to_string(),
            )),
        }
    }
}
