//! LLM gateway client
//!
//! OpenAI-compatible chat completions. The same endpoint serves the image
//! modality: asking for `["image", "text"]` returns images alongside the
//! assistant message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::providers::{
    decode, send_for_text, ChatCompletion, ChatProvider, ChatRequest, GeneratedImage,
    ProviderConfig, ProviderError, TokenUsage,
};
use crate::types::message::ChatMessage;

const PROVIDER: &str = "gateway";

/// Model used when neither the request nor the config names one
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Model used for the image modality
pub const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image-preview";

/// Model used for embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ImageModalityRequest<'a> {
    model: &'a str,
    messages: Vec<MultipartMessage<'a>>,
    modalities: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct MultipartMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    images: Vec<ResponseImage>,
}

#[derive(Debug, Deserialize)]
struct ResponseImage {
    image_url: ResponseImageUrl,
}

#[derive(Debug, Deserialize)]
struct ResponseImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    message: String,
}

// ============================================================================
// GatewayClient
// ============================================================================

pub struct GatewayClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: ProviderConfig) -> Self {
        let client = config.http_client();
        Self { config, client }
    }

    fn model_for(&self, requested: Option<&str>) -> String {
        requested
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<CompletionsResponse, ProviderError> {
        let api_key = self.config.require_key(PROVIDER)?;

        let request = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body);

        let text = send_for_text(PROVIDER, request).await?;
        let response: CompletionsResponse = decode(PROVIDER, &text)?;

        if let Some(error) = &response.error {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: error.message.clone(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for GatewayClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "refusing to send an empty conversation".into(),
            });
        }

        let model = self.model_for(request.model.as_deref());
        let body = CompletionsRequest {
            model: &model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request
                .temperature
                .unwrap_or(DEFAULT_TEMPERATURE)
                .clamp(0.0, 2.0),
        };

        tracing::debug!(model = %model, messages = request.messages.len(), "Gateway completion");
        let response = self.post(&body).await?;

        let content = response
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "no response content from model".into(),
            })?;

        Ok(ChatCompletion {
            model: response.model.unwrap_or(model),
            content,
            usage: response.usage,
        })
    }

    async fn embed(
        &self,
        texts: &[String],
        dimensions: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let api_key = self.config.require_key(PROVIDER)?;

        let request = self
            .client
            .post(self.config.endpoint("embeddings"))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&EmbeddingsRequest {
                model: DEFAULT_EMBEDDING_MODEL,
                input: texts,
                dimensions,
            });

        let text = send_for_text(PROVIDER, request).await?;
        let response: EmbeddingsResponse = decode(PROVIDER, &text)?;
        into_vectors(response, texts.len(), dimensions)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        source_image: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        let mut content = vec![ContentPart::Text { text: prompt }];
        if let Some(url) = source_image {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            });
        }

        let body = ImageModalityRequest {
            model: DEFAULT_IMAGE_MODEL,
            messages: vec![MultipartMessage {
                role: "user",
                content,
            }],
            modalities: ["image", "text"],
        };

        tracing::debug!(edit = source_image.is_some(), "Gateway image generation");
        let response = self.post(&body).await?;

        let images: Vec<GeneratedImage> = response
            .choices
            .unwrap_or_default()
            .into_iter()
            .flat_map(|choice| choice.message.images)
            .map(|image| GeneratedImage {
                url: image.image_url.url,
            })
            .collect();

        if images.is_empty() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "model returned no images".into(),
            });
        }
        Ok(images)
    }
}

/// Order embeddings by input index and reject any count or width mismatch
fn into_vectors(
    mut response: EmbeddingsResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    response.data.sort_by_key(|item| item.index);

    if response.data.len() != expected {
        return Err(ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: format!("expected {} embeddings, got {}", expected, response.data.len()),
        });
    }
    if let Some(item) = response.data.iter().find(|item| item.embedding.len() != dimensions) {
        return Err(ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: format!(
                "expected {}-dimensional embeddings, got {}",
                dimensions,
                item.embedding.len()
            ),
        });
    }
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}
