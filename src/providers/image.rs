//! Dedicated image-generation provider
//!
//! Speaks the common `images/generations` shape and normalises every result
//! to a URL, turning inline base64 payloads into `data:` URLs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::providers::{
    decode, send_for_text, GeneratedImage, ImagePrompt, ImageProvider, ProviderConfig,
    ProviderError,
};

const PROVIDER: &str = "image";

pub const DEFAULT_MODEL: &str = "flux-schnell";
pub const DEFAULT_SIZE: &str = "1024x1024";

/// Sizes the provider accepts
pub const SUPPORTED_SIZES: [&str; 3] = ["1024x1024", "1024x1792", "1792x1024"];

/// Upper bound on images per request
pub const MAX_IMAGES: u8 = 4;

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u8,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GenerationItem>,
}

#[derive(Debug, Deserialize)]
struct GenerationItem {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl GenerationItem {
    fn into_image(self) -> Option<GeneratedImage> {
        match (self.url, self.b64_json) {
            (Some(url), _) if !url.is_empty() => Some(GeneratedImage { url }),
            (_, Some(b64)) if !b64.is_empty() => Some(GeneratedImage {
                url: format!("data:image/png;base64,{}", b64),
            }),
            _ => None,
        }
    }
}

pub struct ImageClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl ImageClient {
    pub fn new(config: ProviderConfig) -> Self {
        let client = config.http_client();
        Self { config, client }
    }
}

/// Fall back to the default size for anything unsupported
pub fn normalize_size(size: Option<&str>) -> &'static str {
    size.and_then(|s| SUPPORTED_SIZES.iter().copied().find(|known| *known == s.trim()))
        .unwrap_or(DEFAULT_SIZE)
}

#[async_trait]
impl ImageProvider for ImageClient {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<Vec<GeneratedImage>, ProviderError> {
        let api_key = self.config.require_key(PROVIDER)?;
        let model = self.config.default_model.as_deref().unwrap_or(DEFAULT_MODEL);

        let body = GenerationRequest {
            model,
            prompt: &prompt.prompt,
            size: normalize_size(prompt.size.as_deref()),
            n: prompt.count.clamp(1, MAX_IMAGES),
            response_format: "b64_json",
        };

        tracing::debug!(model, size = body.size, n = body.n, "Image generation");

        let request = self
            .client
            .post(self.config.endpoint("images/generations"))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body);

        let text = send_for_text(PROVIDER, request).await?;
        let response: GenerationResponse = decode(PROVIDER, &text)?;

        let images: Vec<GeneratedImage> = response
            .data
            .into_iter()
            .filter_map(GenerationItem::into_image)
            .collect();

        if images.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "no images in response".into(),
            });
        }
        Ok(images)
    }
}
