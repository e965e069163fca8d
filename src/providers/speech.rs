//! Speech synthesis provider
//!
//! Posts text to `text-to-speech/{voice}` and returns the audio bytes base64
//! encoded so they can travel inside a JSON response.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;

use crate::providers::{classify_status, ProviderConfig, ProviderError, SpeechAudio, SpeechProvider};

const PROVIDER: &str = "speech";

pub const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_MODEL: &str = "eleven_multilingual_v2";

/// Longest text accepted in one request
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct SpeechClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl SpeechClient {
    pub fn new(config: ProviderConfig) -> Self {
        let client = config.http_client();
        Self { config, client }
    }
}

#[async_trait]
impl SpeechProvider for SpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<SpeechAudio, ProviderError> {
        let api_key = self.config.require_key(PROVIDER)?;
        let voice = voice.filter(|v| !v.trim().is_empty()).unwrap_or(DEFAULT_VOICE);
        let model = self.config.default_model.as_deref().unwrap_or(DEFAULT_MODEL);

        let response = self
            .client
            .post(self.config.endpoint(&format!("text-to-speech/{}", voice)))
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&SynthesisRequest {
                text,
                model_id: model,
            })
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body));
        }

        let mime_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        if bytes.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "empty audio".into(),
            });
        }

        tracing::debug!(voice, bytes = bytes.len(), "Synthesized speech");
        Ok(SpeechAudio {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
            mime_type,
        })
    }
}
