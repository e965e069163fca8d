//! Third-party AI providers
//!
//! Each provider is an opaque HTTP JSON collaborator. This module owns request
//! shaping, response field extraction, and turning HTTP failures into a typed
//! [`ProviderError`] keyed on the status code.

pub mod gateway;
pub mod image;
pub mod speech;
pub mod trends;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::message::ChatMessage;

pub use gateway::GatewayClient;
pub use image::ImageClient;
pub use speech::SpeechClient;
pub use trends::TrendsClient;

/// Longest upstream error text carried into our own errors
const MAX_ERROR_CHARS: usize = 300;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },
    #[error("{provider} requires payment or has no quota left")]
    PaymentRequired { provider: &'static str },
    #[error("{provider} returned {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("Request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

/// Connection settings for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
            && self
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn require_key(&self, provider: &'static str) -> Result<&str, ProviderError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() && !self.base_url.trim().is_empty() => Ok(key),
            _ => Err(ProviderError::NotConfigured(provider)),
        }
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .user_agent(concat!("aihub/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

/// Map a non-success status to a [`ProviderError`]
pub fn classify_status(provider: &'static str, status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { provider },
        StatusCode::PAYMENT_REQUIRED => ProviderError::PaymentRequired { provider },
        _ => ProviderError::Upstream {
            provider,
            status: status.as_u16(),
            message: extract_error_message(body),
        },
    }
}

/// Pull a readable message out of a provider error body
pub fn extract_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error"))
            .or_else(|| v.get("message"))
            .or_else(|| v.get("detail"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_CHARS {
        let truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", truncated)
    } else if message.is_empty() {
        "empty response body".to_string()
    } else {
        message
    }
}

/// Send a request and return the body of a successful response
pub(crate) async fn send_for_text(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    if !status.is_success() {
        tracing::warn!(provider, status = status.as_u16(), "Provider call failed");
        return Err(classify_status(provider, status, &body));
    }
    Ok(body)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}

/// Chat-completions request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub model: String,
    pub content: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// An image as a URL (remote or `data:`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrompt {
    pub prompt: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "default_image_count")]
    pub count: u8,
}

fn default_image_count() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechAudio {
    /// Base64-encoded audio bytes
    pub audio_base64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub volume: Option<u64>,
}

/// LLM gateway (chat completions, including the image modality)
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError>;

    /// One embedding per input, `dimensions` wide
    async fn embed(
        &self,
        texts: &[String],
        dimensions: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Generate (or edit, when `source_image` is given) images through the
    /// gateway's image modality
    async fn generate_image(
        &self,
        prompt: &str,
        source_image: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, ProviderError>;
}

/// Dedicated image-generation API
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<Vec<GeneratedImage>, ProviderError>;
}

/// Speech synthesis
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>)
        -> Result<SpeechAudio, ProviderError>;
}

/// Social/trends data
#[async_trait]
pub trait TrendsProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrendItem>, ProviderError>;
    async fn trending(&self, region: &str, limit: usize) -> Result<Vec<TrendItem>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_uses_code_not_text() {
        // A body mentioning 402 on a 500 stays a generic upstream error
        let err = classify_status(
            "gateway",
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"upstream said 402"}}"#,
        );
        assert!(matches!(err, ProviderError::Upstream { status: 500, .. }));

        let err = classify_status("gateway", StatusCode::PAYMENT_REQUIRED, "");
        assert!(matches!(err, ProviderError::PaymentRequired { .. }));

        let err = classify_status("gateway", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn test_extract_error_message_variants() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(extract_error_message(r#"{"detail":"quota"}"#), "quota");
        assert_eq!(extract_error_message("  plain text "), "plain text");
        assert_eq!(extract_error_message(""), "empty response body");

        let long = "x".repeat(1000);
        assert!(extract_error_message(&long).ends_with("..."));
    }

    #[test]
    fn test_provider_config_requires_key_and_url() {
        let mut config = ProviderConfig {
            base_url: "https://api.example.com/".into(),
            api_key: None,
            default_model: None,
            timeout_secs: 30,
        };
        assert!(!config.is_configured());
        assert!(matches!(
            config.require_key("image"),
            Err(ProviderError::NotConfigured("image"))
        ));

        config.api_key = Some("k".into());
        assert!(config.is_configured());
        assert_eq!(config.endpoint("/v1/x"), "https://api.example.com/v1/x");
    }
}
